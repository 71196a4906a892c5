//! CSV store for the enriched price table.
//!
//! Layout: `{target}` holds the table, `{target}.meta.json` the sidecar.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Overwrite or append-only-new-rows modes
//! - Lenient reads: any header containing `period` and `value`
//! - Metadata sidecar (row count, date range, content hash)

use crate::domain::{parse_period, parse_price, Dataset, DropReport, EnrichedRecord, PriceRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Canonical column order.
pub const HEADER: [&str; 7] = [
    "period",
    "value",
    "day_of_week",
    "percentage_change",
    "flag",
    "run",
    "reversal",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("table is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("metadata error: {0}")]
    Meta(String),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How `write` treats an existing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the file with the full dataset, including header.
    Overwrite,
    /// Append only rows dated after the target's own last row, without
    /// header.
    Append,
}

/// Base columns read back from a stored table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedTable {
    pub records: Vec<PriceRecord>,
    pub dropped: DropReport,
}

/// Metadata sidecar written next to the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub rows: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

/// Render a decimal the way the table has always stored it: shortest
/// round-trip text, with `.0` on integral values.
pub fn format_decimal(x: f64) -> String {
    let s = format!("{x}");
    if x.is_finite() && !s.contains('.') {
        format!("{s}.0")
    } else {
        s
    }
}

fn record_fields(r: &EnrichedRecord) -> [String; 7] {
    [
        r.date.format("%Y-%m-%d").to_string(),
        format_decimal(r.price),
        r.day_name().to_string(),
        r.percentage_change.map(format_decimal).unwrap_or_default(),
        r.flag.to_string(),
        r.run.to_string(),
        if r.reversal { "YES" } else { "NO" }.to_string(),
    ]
}

/// Serialize records as CSV bytes, optionally with the header row.
pub fn render(records: &[EnrichedRecord], header: bool) -> Result<Vec<u8>, StoreError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    if header {
        wtr.write_record(HEADER)?;
    }
    for r in records {
        wtr.write_record(record_fields(r))?;
    }
    wtr.into_inner()
        .map_err(|e| StoreError::Csv(csv::Error::from(e.into_error())))
}

/// Read the `period` and `value` columns from a CSV table.
///
/// Derived columns, if present, are ignored: they are recomputed on every run.
pub fn read_base<R: Read>(reader: R) -> Result<LoadedTable, StoreError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(StoreError::MissingColumn(name))
    };
    let period_idx = column("period")?;
    let value_idx = column("value")?;

    let mut table = LoadedTable::default();
    for row in rdr.records() {
        let row = row?;
        let Some(date) = row.get(period_idx).and_then(parse_period) else {
            table.dropped.bad_date += 1;
            continue;
        };
        let Some(price) = row.get(value_idx).and_then(parse_price) else {
            table.dropped.bad_value += 1;
            continue;
        };
        table.records.push(PriceRecord::new(date, price));
    }
    Ok(table)
}

/// Read a stored table. A missing file is an empty table.
pub fn read_file(path: &Path) -> Result<LoadedTable, StoreError> {
    match fs::File::open(path) {
        Ok(f) => {
            let table = read_base(io::BufReader::new(f))?;
            if !table.dropped.is_empty() {
                warn!(
                    path = %path.display(),
                    bad_date = table.dropped.bad_date,
                    bad_value = table.dropped.bad_value,
                    "dropped stored rows that could not be coerced"
                );
            }
            debug!(path = %path.display(), rows = table.records.len(), "loaded table");
            Ok(table)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no existing data found, starting empty");
            Ok(LoadedTable::default())
        }
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Header row of an existing file, if any.
fn existing_header(path: &Path) -> Result<Option<Vec<String>>, StoreError> {
    match fs::File::open(path) {
        Ok(f) => {
            let mut rdr = csv::ReaderBuilder::new()
                .has_headers(true)
                .trim(csv::Trim::All)
                .from_reader(f);
            let headers = rdr.headers()?;
            Ok(Some(headers.iter().map(str::to_string).collect()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    target.with_file_name(name)
}

/// Path of the metadata sidecar for `target`.
pub fn meta_path(target: &Path) -> PathBuf {
    sibling(target, ".meta.json")
}

/// Write `bytes` to `target` via a temp file and rename.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp_path = sibling(target, ".tmp");
    fs::write(&tmp_path, bytes).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::io(&tmp_path, e)
    })?;
    fs::rename(&tmp_path, target).map_err(|e| {
        // Clean up temp file on rename failure
        let _ = fs::remove_file(&tmp_path);
        StoreError::io(target, e)
    })
}

/// Persist a dataset.
///
/// Creates the containing directory if needed. The target is only ever
/// replaced by rename, so a failed write leaves the previous file intact.
/// The sidecar is written afterwards; failing to write it is logged and does
/// not fail the call.
/// Append mode adds the rows dated after the last row already in `target`,
/// whatever the dataset was loaded from. It falls back to a full overwrite
/// when the existing header is not the canonical one.
pub fn write(dataset: &Dataset, target: &Path, mode: WriteMode) -> Result<StoreMeta, StoreError> {
    if let Some(dir) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    }

    let bytes = match mode {
        WriteMode::Overwrite => render(dataset.records(), true)?,
        WriteMode::Append => match existing_header(target)? {
            None => render(dataset.records(), true)?,
            Some(h) if h.iter().map(String::as_str).eq(HEADER) => {
                let mut bytes = fs::read(target).map_err(|e| StoreError::io(target, e))?;
                let after = read_base(bytes.as_slice())?
                    .records
                    .iter()
                    .map(|r| r.date)
                    .max();
                if !bytes.is_empty() && !bytes.ends_with(b"\n") {
                    bytes.push(b'\n');
                }
                let new_rows = dataset.rows_after(after);
                bytes.extend(render(new_rows, false)?);
                info!(rows = new_rows.len(), "appending rows");
                bytes
            }
            Some(_) => {
                warn!(
                    path = %target.display(),
                    "existing header differs from canonical columns, rewriting whole file"
                );
                render(dataset.records(), true)?
            }
        },
    };

    write_atomic(target, &bytes)?;

    let meta = StoreMeta {
        rows: dataset.len(),
        start_date: dataset.records().first().map(|r| r.date),
        end_date: dataset.last_date(),
        data_hash: blake3::hash(&bytes).to_hex().to_string(),
        written_at: chrono::Local::now().naive_local(),
    };
    // Table is already in place.
    if let Err(e) = write_meta(target, &meta) {
        warn!(path = %target.display(), error = %e, "failed to write metadata sidecar");
    }

    info!(path = %target.display(), rows = meta.rows, "wrote table");
    Ok(meta)
}

fn write_meta(target: &Path, meta: &StoreMeta) -> Result<(), StoreError> {
    let meta_json = serde_json::to_string_pretty(meta)
        .map_err(|e| StoreError::Meta(format!("meta serialization: {e}")))?;
    write_atomic(&meta_path(target), meta_json.as_bytes())
}

/// Read the metadata sidecar for `target`, if present and valid.
pub fn read_meta(target: &Path) -> Option<StoreMeta> {
    let content = fs::read_to_string(meta_path(target)).ok()?;
    serde_json::from_str(&content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::derive::derive_dataset;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sample() -> Dataset {
        derive_dataset(vec![
            PriceRecord::new(d(1), 10.0),
            PriceRecord::new(d(2), 10.5),
            PriceRecord::new(d(3), 10.5),
            PriceRecord::new(d(4), 9.45),
        ])
    }

    #[test]
    fn decimals_keep_a_fraction() {
        assert_eq!(format_decimal(5.0), "5.0");
        assert_eq!(format_decimal(-10.0), "-10.0");
        assert_eq!(format_decimal(2.575), "2.575");
        assert_eq!(format_decimal(0.0), "0.0");
    }

    #[test]
    fn render_matches_expected_layout() {
        let text = String::from_utf8(render(sample().records(), true).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "period,value,day_of_week,percentage_change,flag,run,reversal"
        );
        assert_eq!(lines[1], "2024-01-01,10.0,Monday,,FLAT,1,NO");
        assert_eq!(lines[2], "2024-01-02,10.5,Tuesday,5.0,UP,1,NO");
        assert_eq!(lines[3], "2024-01-03,10.5,Wednesday,0.0,FLAT,1,NO");
        assert_eq!(lines[4], "2024-01-04,9.45,Thursday,-10.0,DOWN,1,NO");
    }

    #[test]
    fn read_accepts_column_subsets() {
        let csv = "period,value\n2024-01-02,2.5\n2024-01-03 00:00:00,2.6\n";
        let t = read_base(csv.as_bytes()).unwrap();
        assert_eq!(
            t.records,
            vec![PriceRecord::new(d(2), 2.5), PriceRecord::new(d(3), 2.6)]
        );
    }

    #[test]
    fn read_drops_uncoercible_rows() {
        let csv = "period,value,flag\n2024-01-02,,UP\n2024-01-03,abc,UP\nbad,2.0,UP\n2024-01-04,2.7,UP\n";
        let t = read_base(csv.as_bytes()).unwrap();
        assert_eq!(t.records, vec![PriceRecord::new(d(4), 2.7)]);
        assert_eq!(t.dropped.bad_value, 2);
        assert_eq!(t.dropped.bad_date, 1);
    }

    #[test]
    fn read_requires_period_and_value() {
        let err = read_base("date,price\n2024-01-02,2.5\n".as_bytes()).unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn("period")));
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let t = read_file(&dir.path().join("absent.csv")).unwrap();
        assert!(t.records.is_empty());
    }

    #[test]
    fn overwrite_creates_directory_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/data/prices.csv");
        let meta = write(&sample(), &target, WriteMode::Overwrite).unwrap();
        assert_eq!(meta.rows, 4);
        assert_eq!(meta.end_date, Some(d(4)));
        assert!(target.exists());
        assert!(!sibling(&target, ".tmp").exists());
        assert_eq!(read_meta(&target), Some(meta));

        let back = read_file(&target).unwrap();
        assert_eq!(back.records, sample().base_records());
    }

    #[test]
    fn append_adds_only_new_rows() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("prices.csv");
        let first = derive_dataset(sample().base_records()[..2].to_vec());
        write(&first, &target, WriteMode::Overwrite).unwrap();

        write(&sample(), &target, WriteMode::Append).unwrap();
        let text = fs::read_to_string(&target).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert_eq!(text.matches("period,").count(), 1);
        assert!(text.ends_with("2024-01-04,9.45,Thursday,-10.0,DOWN,1,NO\n"));
    }

    #[test]
    fn append_to_missing_file_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("prices.csv");
        write(&sample(), &target, WriteMode::Append).unwrap();
        let back = read_file(&target).unwrap();
        assert_eq!(back.records.len(), 4);
    }

    #[test]
    fn append_to_legacy_header_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("prices.csv");
        fs::write(&target, "period,value\n2024-01-01,10.0\n").unwrap();
        write(&sample(), &target, WriteMode::Append).unwrap();
        let text = fs::read_to_string(&target).unwrap();
        assert!(text.starts_with("period,value,day_of_week"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn failed_write_leaves_previous_table_intact() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("prices.csv");
        write(&sample(), &target, WriteMode::Overwrite).unwrap();
        let before = fs::read(&target).unwrap();
        let meta_before = read_meta(&target);

        // Occupy the temp path so the new table cannot be staged.
        fs::create_dir(sibling(&target, ".tmp")).unwrap();
        let smaller = derive_dataset(sample().base_records()[..1].to_vec());
        let err = write(&smaller, &target, WriteMode::Overwrite).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));

        assert_eq!(fs::read(&target).unwrap(), before);
        assert_eq!(read_meta(&target), meta_before);
        assert!(sibling(&target, ".tmp").is_dir());
    }

    #[test]
    fn failed_rename_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be replaced by a file.
        let target = dir.path().join("prices.csv");
        fs::create_dir(&target).unwrap();

        let err = write(&sample(), &target, WriteMode::Overwrite).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(target.is_dir());
        assert!(!sibling(&target, ".tmp").exists());
        assert!(!meta_path(&target).exists());
    }

    #[test]
    fn sidecar_failure_does_not_fail_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("prices.csv");
        fs::create_dir(meta_path(&target)).unwrap();

        let meta = write(&sample(), &target, WriteMode::Overwrite).unwrap();
        assert_eq!(meta.rows, 4);
        assert_eq!(read_file(&target).unwrap().records, sample().base_records());
        assert_eq!(read_meta(&target), None);
        assert!(!sibling(&meta_path(&target), ".tmp").exists());
    }

    #[test]
    fn append_uses_the_target_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("prices.csv");

        // Target already ahead of the dataset: nothing to add.
        write(&sample(), &target, WriteMode::Overwrite).unwrap();
        let before = fs::read_to_string(&target).unwrap();
        let behind = derive_dataset(sample().base_records()[..3].to_vec());
        write(&behind, &target, WriteMode::Append).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), before);

        // Target behind the dataset: every missing row is added, once.
        let first = derive_dataset(sample().base_records()[..1].to_vec());
        write(&first, &target, WriteMode::Overwrite).unwrap();
        write(&sample(), &target, WriteMode::Append).unwrap();
        let back = read_file(&target).unwrap();
        assert_eq!(back.records, sample().base_records());
    }
}
