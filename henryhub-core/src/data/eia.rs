//! EIA open-data API page source.
//!
//! Fetches daily spot prices from the v2 natural-gas price endpoint, newest
//! first. One call to `get_page` is one HTTP request; retries live in the
//! paginated fetcher.

use super::provider::{AttemptError, FetchError, PageQuery, PageSource};
use crate::config::ApiConfig;
use std::time::Duration;

/// EIA v2 API page source.
pub struct EiaSource {
    client: reqwest::blocking::Client,
    base_url: String,
    series: String,
    frequency: String,
    api_key: String,
}

impl EiaSource {
    pub fn new(api: &ApiConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .user_agent(concat!("henryhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: api.base_url.clone(),
            series: api.series.clone(),
            frequency: api.frequency.clone(),
            api_key: api.api_key.clone().unwrap_or_default(),
        })
    }

    /// Query parameters for one page request.
    fn query_params(&self, query: &PageQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("frequency", self.frequency.clone()),
            ("data[0]", "value".to_string()),
            ("facets[series][]", self.series.clone()),
            ("sort[0][column]", "period".to_string()),
            ("sort[0][direction]", "desc".to_string()),
            ("length", query.length.to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(start) = query.start {
            params.push(("start", start.format("%Y-%m-%d").to_string()));
        }
        params
    }
}

impl PageSource for EiaSource {
    fn name(&self) -> &str {
        "eia"
    }

    fn get_page(&self, query: &PageQuery) -> Result<String, AttemptError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&self.query_params(query))
            .send()
            .map_err(|e| AttemptError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        resp.text()
            .map_err(|e| AttemptError::Network(format!("failed to read body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn source() -> EiaSource {
        let api = ApiConfig {
            api_key: Some("secret".into()),
            ..ApiConfig::default()
        };
        EiaSource::new(&api).unwrap()
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn query_selects_series_and_page() {
        let params = source().query_params(&PageQuery {
            offset: 5000,
            length: 5000,
            start: None,
        });
        assert_eq!(param(&params, "api_key"), Some("secret"));
        assert_eq!(param(&params, "facets[series][]"), Some("RNGWHHD"));
        assert_eq!(param(&params, "frequency"), Some("daily"));
        assert_eq!(param(&params, "sort[0][direction]"), Some("desc"));
        assert_eq!(param(&params, "offset"), Some("5000"));
        assert_eq!(param(&params, "length"), Some("5000"));
        assert_eq!(param(&params, "start"), None);
    }

    #[test]
    fn query_includes_start_bound() {
        let params = source().query_params(&PageQuery {
            offset: 0,
            length: 100,
            start: NaiveDate::from_ymd_opt(2024, 1, 10),
        });
        assert_eq!(param(&params, "start"), Some("2024-01-10"));
    }
}
