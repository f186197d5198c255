use chrono::NaiveDate;
use serde::Deserialize;

use crate::engine::ReconOptions;
use crate::error::ReconError;
use crate::key::DuplicatePolicy;
use crate::report::ReportFormat;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub key_fields: Vec<String>,
    #[serde(default)]
    pub compare_fields: Option<Vec<String>>,
    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,
    #[serde(default = "default_true")]
    pub parallel_fetch: bool,
    #[serde(default)]
    pub period: Option<PeriodConfig>,
    pub source_a: SourceConfig,
    pub source_b: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PeriodConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// `text`, `json` or `csv`. Defaults to text.
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

impl OutputConfig {
    pub fn report_format(&self) -> Result<ReportFormat, ReconError> {
        match &self.format {
            Some(f) => f.parse(),
            None => Ok(ReportFormat::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where one side's records come from. Adapters are built from this by the
/// caller; the engine only sees the resulting `DataSource`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Csv(CsvSourceConfig),
    Json(JsonSourceConfig),
    Sqlite(SqliteSourceConfig),
    Api(ApiSourceConfig),
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Csv(c) => &c.name,
            Self::Json(c) => &c.name,
            Self::Sqlite(c) => &c.name,
            Self::Api(c) => &c.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Csv(_) => "csv",
            Self::Json(_) => "json",
            Self::Sqlite(_) => "sqlite",
            Self::Api(_) => "api",
        }
    }
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvSourceConfig {
    pub name: String,
    pub file: String,
    pub date_field: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Columns parsed as financial numbers instead of kept as text.
    #[serde(default)]
    pub numeric_fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonSourceConfig {
    pub name: String,
    pub file: String,
    pub date_field: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Dotted path to the records array, e.g. `data.transactions`.
    #[serde(default)]
    pub records_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SqliteSourceConfig {
    pub name: String,
    /// Path to a `.db`, `.sqlite` or `.sqlite3` file.
    pub database: String,
    /// May reference `:start_date` / `:end_date`.
    pub query: String,
    #[serde(default)]
    pub date_field: Option<String>,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSourceConfig {
    pub name: String,
    pub base_url: String,
    pub endpoint: String,
    /// Environment variable holding the bearer token. Tokens are never
    /// read from the config file itself.
    #[serde(default)]
    pub token_env: Option<String>,
    /// When set, records are filtered client-side on this field.
    #[serde(default)]
    pub date_field: Option<String>,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub records_path: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

pub const MAX_API_RETRIES: u32 = 10;

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.key_fields.is_empty() {
            return Err(ReconError::invalid("key_fields must list at least one field"));
        }
        if self.key_fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ReconError::invalid("key_fields must not contain blank names"));
        }
        if let Some(fields) = &self.compare_fields {
            if fields.iter().any(|f| f.trim().is_empty()) {
                return Err(ReconError::invalid("compare_fields must not contain blank names"));
            }
        }

        if let Some(period) = &self.period {
            if period.start > period.end {
                return Err(ReconError::invalid(format!(
                    "period start {} is after end {}",
                    period.start, period.end
                )));
            }
        }

        self.output.report_format()?;

        for (side, source) in [("source_a", &self.source_a), ("source_b", &self.source_b)] {
            validate_source(side, source)?;
        }
        if self.source_a.name() == self.source_b.name() {
            return Err(ReconError::invalid(format!(
                "source_a and source_b must have distinct names (both are '{}')",
                self.source_a.name()
            )));
        }

        Ok(())
    }

    /// Engine options for a run over `[start, end]`.
    pub fn options(&self, start: NaiveDate, end: NaiveDate) -> ReconOptions {
        ReconOptions {
            start,
            end,
            key_fields: self.key_fields.clone(),
            comparison_fields: self.compare_fields.clone(),
            on_duplicate: self.on_duplicate,
            parallel_fetch: self.parallel_fetch,
        }
    }
}

fn validate_source(side: &str, source: &SourceConfig) -> Result<(), ReconError> {
    if source.name().trim().is_empty() {
        return Err(ReconError::invalid(format!("{side}: name must not be empty")));
    }

    match source {
        SourceConfig::Csv(c) => {
            if c.date_field.trim().is_empty() {
                return Err(ReconError::invalid(format!("{side}: date_field must not be empty")));
            }
        }
        SourceConfig::Json(c) => {
            if c.date_field.trim().is_empty() {
                return Err(ReconError::invalid(format!("{side}: date_field must not be empty")));
            }
        }
        SourceConfig::Sqlite(c) => {
            if c.query.trim().is_empty() {
                return Err(ReconError::invalid(format!("{side}: query must not be empty")));
            }
        }
        SourceConfig::Api(c) => {
            if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
                return Err(ReconError::invalid(format!(
                    "{side}: base_url must start with http:// or https://, got '{}'",
                    c.base_url
                )));
            }
            if c.retries > MAX_API_RETRIES {
                return Err(ReconError::invalid(format!(
                    "{side}: retries must be at most {MAX_API_RETRIES}, got {}",
                    c.retries
                )));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
