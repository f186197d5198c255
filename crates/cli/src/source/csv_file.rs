use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tally_recon::config::CsvSourceConfig;
use tally_recon::{DataSource, ReconError, Record, Value};
use tracing::{debug, info};

use super::{filter_by_date, resolve_path};

/// Read a cell of a `numeric_fields` column.
///
/// Export formatting is accepted: currency signs, thousands separators and
/// accounting negatives like `(12.00)`. A blank cell is null; a cell that is
/// still not a number is kept as text so the comparison reports it.
pub fn numeric_cell(cell: &str) -> Value {
    let text = cell.trim();
    if text.is_empty() {
        return Value::Null;
    }

    let (text, accounting_negative) = match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => (inner, true),
        None => (text, false),
    };
    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();

    let unsigned = digits.strip_prefix(&['-', '+'][..]);
    let well_formed = match unsigned {
        Some(_) if accounting_negative => false,
        Some(body) => is_plain_decimal(body),
        None => is_plain_decimal(&digits),
    };
    if !well_formed {
        return Value::String(cell.to_string());
    }

    match digits.parse::<f64>() {
        Ok(n) if accounting_negative => Value::Float(-n),
        Ok(n) => Value::Float(n),
        Err(_) => Value::String(cell.to_string()),
    }
}

fn is_plain_decimal(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

pub struct CsvSource {
    name: String,
    path: PathBuf,
    date_field: String,
    date_format: String,
    delimiter: u8,
    numeric_fields: Vec<String>,
}

impl CsvSource {
    pub fn from_config(config: &CsvSourceConfig, base_dir: &Path) -> Result<Self, ReconError> {
        let delimiter = u8::try_from(config.delimiter).map_err(|_| {
            ReconError::invalid(format!(
                "{}: delimiter must be a single-byte character, got {:?}",
                config.name, config.delimiter
            ))
        })?;

        Ok(Self {
            name: config.name.clone(),
            path: resolve_path(base_dir, &config.file),
            date_field: config.date_field.clone(),
            date_format: config.date_format.clone(),
            delimiter,
            numeric_fields: config.numeric_fields.clone(),
        })
    }

    fn reader(&self) -> Result<csv::Reader<std::fs::File>, ReconError> {
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_path(&self.path)
            .map_err(|e| self.unavailable(format!("cannot read {}: {e}", self.path.display())))
    }

    fn unavailable(&self, message: impl Into<String>) -> ReconError {
        ReconError::source_unavailable(&self.name, message)
    }

    fn cell_value(&self, column: &str, cell: &str) -> Value {
        if !self.numeric_fields.iter().any(|f| f == column) {
            return Value::String(cell.to_string());
        }
        numeric_cell(cell)
    }

    fn read_all(&self) -> Result<Vec<Record>, ReconError> {
        let mut reader = self.reader()?;
        let headers = reader
            .headers()
            .map_err(|e| self.unavailable(format!("cannot read header row: {e}")))?
            .clone();

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| self.unavailable(format!("row {}: {e}", line + 2)))?;
            let record: Record = headers
                .iter()
                .zip(row.iter())
                .map(|(column, cell)| (column, self.cell_value(column, cell)))
                .collect();
            records.push(record);
        }
        Ok(records)
    }
}

impl DataSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_transactions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>, ReconError> {
        let records = self.read_all()?;
        let kept = filter_by_date(&self.name, records, &self.date_field, &self.date_format, start, end);
        info!(source = %self.name, path = %self.path.display(), count = kept.len(), "loaded CSV transactions");
        Ok(kept)
    }

    fn list_fields(&self) -> Vec<String> {
        match self.reader().and_then(|mut r| {
            r.headers()
                .map(|h| h.iter().map(str::to_string).collect())
                .map_err(|e| self.unavailable(e.to_string()))
        }) {
            Ok(fields) => fields,
            Err(e) => {
                debug!(source = %self.name, error = %e, "cannot list CSV fields");
                Vec::new()
            }
        }
    }
}
