use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::exit_codes::{EXIT_ERROR, EXIT_RECON_RUNTIME};
use crate::CliError;

/// Default filter for a `-v` count when `RUST_LOG` is unset.
fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the global subscriber. Logs go to stderr unless `log_file` is set.
pub fn init(verbose: u8, log_file: Option<&Path>) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| CliError {
                code: EXIT_RECON_RUNTIME,
                message: format!("cannot create log file {}: {e}", path.display()),
                hint: None,
            })?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| CliError {
        code: EXIT_ERROR,
        message: format!("cannot initialise logging: {e}"),
        hint: None,
    })
}
