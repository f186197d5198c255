//! `tally-recon`: two-source transaction reconciliation engine.
//!
//! Pure engine crate: pulls records through the [`DataSource`] trait, matches
//! them by composite key, compares the configured fields and returns a
//! [`ReconciliationResult`]. Concrete adapters (files, databases, HTTP) live
//! in the CLI crate.

pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod matcher;
pub mod model;
pub mod report;
pub mod source;

pub use config::ReconConfig;
pub use engine::{reconcile, reconcile_fetched, FetchedSource, ReconOptions};
pub use error::{DuplicateKey, ReconError};
pub use key::DuplicatePolicy;
pub use model::{
    FieldMismatch, MatchEntry, MismatchEntry, ReconSummary, ReconciliationResult, Record, Value,
};
pub use report::{render, ReportFormat};
pub use source::{DataSource, StaticSource};
