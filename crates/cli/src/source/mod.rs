//! Data source adapters for `tally run`.
//!
//! Each `[source_a]` / `[source_b]` table in the config becomes one adapter
//! implementing [`tally_recon::DataSource`]:
//! - `csv_file`: delimited file with a header row
//! - `json_file`: JSON document, records at an optional dotted path
//! - `sqlite`: SQL query against a SQLite database file
//! - `api`: HTTP GET returning JSON, bearer token from the environment
//!
//! Adapters apply their own date semantics. A failure to read, parse or
//! reach the underlying system is always a `SourceUnavailable` error; a
//! single record whose date cannot be parsed is skipped with a warning.

pub mod api;
pub mod csv_file;
pub mod json_file;
pub mod sqlite;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tally_recon::config::SourceConfig;
use tally_recon::{DataSource, ReconError, Record, Value};
use tracing::{debug, warn};

/// Build the adapter described by `config`. Relative file paths resolve
/// against `base_dir` (the config file's directory).
pub fn build_source(config: &SourceConfig, base_dir: &Path) -> Result<Box<dyn DataSource>, ReconError> {
    debug!(source = config.name(), kind = config.kind(), "building source");
    let source: Box<dyn DataSource> = match config {
        SourceConfig::Csv(c) => Box::new(csv_file::CsvSource::from_config(c, base_dir)?),
        SourceConfig::Json(c) => Box::new(json_file::JsonSource::from_config(c, base_dir)),
        SourceConfig::Sqlite(c) => Box::new(sqlite::SqliteSource::from_config(c, base_dir)),
        SourceConfig::Api(c) => Box::new(api::ApiSource::from_config(c)?),
    };
    Ok(source)
}

pub(crate) fn resolve_path(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse a record's date value with `format`. A datetime is accepted when
/// the format carries time components; only its date part is kept.
pub(crate) fn parse_record_date(value: &Value, format: &str) -> Option<NaiveDate> {
    let Value::String(raw) = value else {
        return None;
    };
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
        return Some(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
        return Some(datetime.date());
    }
    DateTime::parse_from_str(raw, format)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// Keep records whose `date_field` falls in `[start, end]`. Records with a
/// missing or unparsable date are dropped and logged.
pub(crate) fn filter_by_date(
    source: &str,
    records: Vec<Record>,
    date_field: &str,
    format: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Record> {
    let total = records.len();
    let mut skipped = 0usize;

    let kept: Vec<Record> = records
        .into_iter()
        .filter(|record| {
            let value = record.get(date_field).cloned().unwrap_or(Value::Null);
            match parse_record_date(&value, format) {
                Some(date) => start <= date && date <= end,
                None => {
                    warn!(source, field = date_field, value = %value, "skipping record with unparsable date");
                    skipped += 1;
                    false
                }
            }
        })
        .collect();

    debug!(source, total, kept = kept.len(), skipped, "date filter applied");
    kept
}

// ---------------------------------------------------------------------------
// JSON documents
// ---------------------------------------------------------------------------

/// Walk a dotted path (`data.transactions`) into `doc`.
fn walk_path<'a>(doc: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(doc, |current, segment| current.get(segment))
}

/// Extract the record array from a JSON document.
pub(crate) fn select_records(
    source: &str,
    doc: &serde_json::Value,
    records_path: Option<&str>,
) -> Result<Vec<Record>, ReconError> {
    let target = match records_path {
        Some(path) => walk_path(doc, path).ok_or_else(|| {
            ReconError::source_unavailable(source, format!("records path '{path}' not found"))
        })?,
        None => doc,
    };

    let items = target.as_array().ok_or_else(|| {
        ReconError::source_unavailable(source, "expected an array of records")
    })?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::Object(object) => Ok(Record::from_json_object(object.clone())),
            _ => Err(ReconError::source_unavailable(
                source,
                format!("record {i} is not a JSON object"),
            )),
        })
        .collect()
}
