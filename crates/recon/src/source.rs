//! Data source contract consumed by the engine.
//!
//! Adapters (files, databases, HTTP APIs) live outside this crate and
//! implement [`DataSource`]. The engine never re-filters by date: each
//! adapter applies its own date semantics to the requested range.

use chrono::NaiveDate;

use crate::error::ReconError;
use crate::model::Record;

pub trait DataSource: Send + Sync {
    /// Display name, used in reports and error messages.
    fn name(&self) -> &str;

    /// Records dated within `[start, end]`, both ends inclusive.
    ///
    /// Fails with [`ReconError::SourceUnavailable`] when the underlying system
    /// cannot be reached or its data cannot be parsed.
    fn fetch_transactions(&self, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Record>, ReconError>;

    /// Field names this source provides, best effort. Only used to pick
    /// default comparison fields; an empty list means "unknown".
    fn list_fields(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A source backed by records already in memory. Returns every record
/// regardless of the requested range.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    records: Vec<Record>,
    fields: Vec<String>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
            fields: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }
}

impl DataSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_transactions(&self, _start: NaiveDate, _end: NaiveDate) -> Result<Vec<Record>, ReconError> {
        Ok(self.records.clone())
    }

    fn list_fields(&self) -> Vec<String> {
        self.fields.clone()
    }
}
