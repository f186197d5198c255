// tally CLI - reconcile transactions between two systems

mod exit_codes;
mod logging;
mod run;
mod source;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tally_recon::ReportFormat;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Reconcile transaction records between two systems")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "TALLY_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  tally run recon.toml
  tally run recon.toml --start 2026-01-01 --end 2026-01-31
  tally run recon.toml --format json --output report.json
  tally run recon.toml --strict-exit -v")]
    Run {
        /// Path to the recon config file
        config: PathBuf,

        /// First day of the period (YYYY-MM-DD), overrides [period].start
        #[arg(long, value_name = "DATE")]
        start: Option<NaiveDate>,

        /// Last day of the period (YYYY-MM-DD, inclusive), overrides [period].end
        #[arg(long, value_name = "DATE")]
        end: Option<NaiveDate>,

        /// Report format: text, json or csv. Overrides [output].format
        #[arg(long, short = 'f')]
        format: Option<ReportFormat>,

        /// Write the report to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Exit 64 when mismatches or one-sided records are found
        #[arg(long)]
        strict_exit: bool,
    },

    /// Validate a recon config without fetching anything
    #[command(after_help = "\
Examples:
  tally validate recon.toml")]
    Validate {
        /// Path to the recon config file
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = logging::init(cli.verbose, cli.log_file.as_deref()).and_then(|()| match cli.command {
        Commands::Run { config, start, end, format, output, strict_exit } => run::cmd_run(run::RunArgs {
            config,
            start,
            end,
            format,
            output,
            strict_exit,
        }),
        Commands::Validate { config } => run::cmd_validate(config),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}
