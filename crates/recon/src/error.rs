use std::fmt;

/// A key that occurred more than once within one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    pub source: String,
    pub key: String,
    pub count: usize,
}

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Caller-supplied settings are unusable (empty key fields, bad period,
    /// unsupported report format). Raised before any source is fetched.
    InvalidConfiguration(String),
    /// A data source could not be reached or its records could not be parsed.
    SourceUnavailable { source: String, message: String },
    /// Duplicate composite keys under `on_duplicate = "error"`.
    DuplicateKeys(Vec<DuplicateKey>),
    /// Report rendering failed (CSV / JSON writer).
    Render(String),
}

impl ReconError {
    pub fn source_unavailable(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source: source.into(),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::SourceUnavailable { source, message } => {
                write!(f, "source '{source}' unavailable: {message}")
            }
            Self::DuplicateKeys(dups) => {
                write!(f, "duplicate keys found:")?;
                for dup in dups {
                    write!(f, "\n  {} key {:?} appears {} times", dup.source, dup.key, dup.count)?;
                }
                Ok(())
            }
            Self::Render(msg) => write!(f, "report rendering error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
