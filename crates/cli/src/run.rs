//! `tally run` and `tally validate`: config-driven two-source reconciliation.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tally_recon::{reconcile, render, ReconConfig, ReconError, ReportFormat};
use tracing::info;

use crate::exit_codes::{recon_exit_code, EXIT_RECON_DIFFS, EXIT_RECON_RUNTIME, EXIT_USAGE};
use crate::source::{build_source, resolve_path};
use crate::CliError;

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::DuplicateKeys(_) => {
                Some("set on_duplicate = \"keep_last\" or \"keep_all\" to reconcile anyway".to_string())
            }
            _ => None,
        };
        CliError { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

/// Read and validate a config file.
fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        recon_err(EXIT_RECON_RUNTIME, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    Ok(ReconConfig::from_toml(&config_str)?)
}

fn config_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

/// Resolve the run period: flags win over `[period]`.
fn resolve_period(
    config: &ReconConfig,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), CliError> {
    let start = start.or(config.period.map(|p| p.start));
    let end = end.or(config.period.map(|p| p.end));
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(CliError {
            code: EXIT_USAGE,
            message: "no reconciliation period".into(),
            hint: Some("pass --start and --end, or add a [period] table to the config".into()),
        }),
    }
}

pub struct RunArgs {
    pub config: PathBuf,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub format: Option<ReportFormat>,
    pub output: Option<PathBuf>,
    pub strict_exit: bool,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let base_dir = config_dir(&args.config);

    let (start, end) = resolve_period(&config, args.start, args.end)?;
    let options = config.options(start, end);
    options.validate()?;

    let format = match args.format {
        Some(format) => format,
        None => config.output.report_format()?,
    };
    let output = args
        .output
        .or_else(|| config.output.file.as_deref().map(|f| resolve_path(base_dir, f)));

    let source_a = build_source(&config.source_a, base_dir)?;
    let source_b = build_source(&config.source_b, base_dir)?;

    info!(
        name = config.name.as_deref().unwrap_or("unnamed"),
        source_a = source_a.name(),
        source_b = source_b.name(),
        %start,
        %end,
        on_duplicate = %options.on_duplicate,
        "starting reconciliation"
    );

    let result = reconcile(source_a.as_ref(), source_b.as_ref(), &options)?;

    let s = &result.summary;
    info!(
        matches = s.matches,
        mismatches = s.mismatches,
        only_in_a = s.only_in_a,
        only_in_b = s.only_in_b,
        compared = ?result.comparison_fields,
        "reconciliation complete"
    );

    let report = render(&result, format)?;
    match &output {
        Some(path) => {
            std::fs::write(path, &report).map_err(|e| {
                recon_err(EXIT_RECON_RUNTIME, format!("cannot write report {}: {e}", path.display()))
            })?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{report}"),
    }

    // Human summary to stderr
    eprintln!(
        "{} vs {}: {} matched, {} mismatched, {} only in {}, {} only in {}",
        result.source_a,
        result.source_b,
        s.matches,
        s.mismatches,
        s.only_in_a,
        result.source_a,
        s.only_in_b,
        result.source_b,
    );
    if s.duplicate_keys_a + s.duplicate_keys_b > 0 {
        eprintln!(
            "warning: {} duplicate key(s) in {}, {} in {} (policy: {})",
            s.duplicate_keys_a, result.source_a, s.duplicate_keys_b, result.source_b, options.on_duplicate,
        );
    }

    if args.strict_exit && !s.is_clean() {
        return Err(recon_err(EXIT_RECON_DIFFS, ""));
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let compare = match &config.compare_fields {
        Some(fields) if !fields.is_empty() => fields.join(", "),
        _ => "shared fields".to_string(),
    };
    eprintln!(
        "valid: '{}' reconciles {} ({}) against {} ({}) on [{}], comparing {}",
        config.name.as_deref().unwrap_or("unnamed"),
        config.source_a.name(),
        config.source_a.kind(),
        config.source_b.name(),
        config.source_b.kind(),
        config.key_fields.join(", "),
        compare,
    );
    Ok(())
}
