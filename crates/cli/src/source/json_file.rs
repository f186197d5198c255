use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tally_recon::config::JsonSourceConfig;
use tally_recon::{DataSource, ReconError, Record};
use tracing::{debug, info};

use super::{filter_by_date, resolve_path, select_records};

pub struct JsonSource {
    name: String,
    path: PathBuf,
    date_field: String,
    date_format: String,
    records_path: Option<String>,
}

impl JsonSource {
    pub fn from_config(config: &JsonSourceConfig, base_dir: &Path) -> Self {
        Self {
            name: config.name.clone(),
            path: resolve_path(base_dir, &config.file),
            date_field: config.date_field.clone(),
            date_format: config.date_format.clone(),
            records_path: config.records_path.clone(),
        }
    }

    fn read_all(&self) -> Result<Vec<Record>, ReconError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            ReconError::source_unavailable(&self.name, format!("cannot read {}: {e}", self.path.display()))
        })?;
        let doc: serde_json::Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))
            .map_err(|e| {
                ReconError::source_unavailable(&self.name, format!("invalid JSON in {}: {e}", self.path.display()))
            })?;
        select_records(&self.name, &doc, self.records_path.as_deref())
    }
}

impl DataSource for JsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_transactions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>, ReconError> {
        let records = self.read_all()?;
        let kept = filter_by_date(&self.name, records, &self.date_field, &self.date_format, start, end);
        info!(source = %self.name, path = %self.path.display(), count = kept.len(), "loaded JSON transactions");
        Ok(kept)
    }

    /// Keys of the first record.
    fn list_fields(&self) -> Vec<String> {
        match self.read_all() {
            Ok(records) => records
                .first()
                .map(|r| r.field_names().map(str::to_string).collect())
                .unwrap_or_default(),
            Err(e) => {
                debug!(source = %self.name, error = %e, "cannot list JSON fields");
                Vec::new()
            }
        }
    }
}
