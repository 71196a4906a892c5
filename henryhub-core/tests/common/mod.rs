//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use henryhub_core::data::{AttemptError, PageQuery, PageSource};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Mutex;
use std::thread;

/// Page source backed by a fixed script of responses, one per request.
///
/// Requests beyond the end of the script fail with HTTP 404.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<String, AttemptError>>>,
    queries: Mutex<Vec<PageQuery>>,
}

impl ScriptedSource {
    pub fn new(responses: impl IntoIterator<Item = Result<String, AttemptError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Build a successful page body from `(period, value)` pairs.
    pub fn page(rows: &[(&str, &str)]) -> Result<String, AttemptError> {
        let data: Vec<Value> = rows
            .iter()
            .map(|(p, v)| json!({ "period": p, "value": v }))
            .collect();
        Ok(json!({ "response": { "data": data } }).to_string())
    }

    /// Every query received so far, in order.
    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }
}

impl PageSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn get_page(&self, query: &PageQuery) -> Result<String, AttemptError> {
        self.queries.lock().unwrap().push(*query);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AttemptError::Status(404)))
    }
}

/// Serve `body` once over HTTP on a loopback port and return its URL.
pub fn serve_once(body: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/prices.csv", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        stream.write_all(response.as_bytes()).unwrap();
    });

    url
}
