//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Code | Domain    | Description                                        |
//! |------|-----------|----------------------------------------------------|
//! | 0    | Universal | Success                                            |
//! | 1    | Universal | General error (unspecified)                        |
//! | 2    | Universal | CLI usage error (bad args, bad date)               |
//! | 60   | recon     | Config parse or validation failure                 |
//! | 61   | recon     | A data source could not be read                    |
//! | 62   | recon     | Duplicate keys under `on_duplicate = "error"`      |
//! | 63   | recon     | Runtime / IO failure (config read, report write)   |
//! | 64   | recon     | Differences found (only with `--strict-exit`)      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use tally_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (60-69)
// =============================================================================

/// Config file is not valid TOML, has the wrong shape, or fails validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 60;

/// A source failed to load (missing file, bad JSON, HTTP failure, …).
pub const EXIT_RECON_SOURCE: u8 = 61;

/// Duplicate keys found and `on_duplicate = "error"`.
pub const EXIT_RECON_DUPLICATE: u8 = 62;

/// Runtime error: config unreadable, report could not be written.
pub const EXIT_RECON_RUNTIME: u8 = 63;

/// Reconciliation completed but found mismatches or one-sided records.
/// Only returned with `--strict-exit`; otherwise differences exit 0.
pub const EXIT_RECON_DIFFS: u8 = 64;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::InvalidConfiguration(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::SourceUnavailable { .. } => EXIT_RECON_SOURCE,
        ReconError::DuplicateKeys(_) => EXIT_RECON_DUPLICATE,
        ReconError::Render(_) => EXIT_RECON_RUNTIME,
    }
}
