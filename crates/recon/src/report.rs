//! Rendering of a [`ReconciliationResult`] as text, JSON or CSV.
//!
//! Rendering is a pure projection of the result: nothing here mutates it,
//! and every format is derived from the same fields.

use std::fmt;
use std::str::FromStr;

use crate::error::ReconError;
use crate::model::{Record, ReconciliationResult};

/// Entries shown per section in the text report.
pub const PREVIEW_LIMIT: usize = 10;

/// Fields shown next to the key fields when a one-sided record is printed.
pub const DISPLAY_FIELDS: [&str; 5] = ["amount", "currency", "status", "type", "date"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl FromStr for ReportFormat {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(ReconError::invalid(format!(
                "unsupported report format \"{other}\" (expected text, json or csv)"
            ))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

pub fn render(result: &ReconciliationResult, format: ReportFormat) -> Result<String, ReconError> {
    match format {
        ReportFormat::Text => Ok(render_text(result)),
        ReportFormat::Json => render_json(result),
        ReportFormat::Csv => render_csv(result),
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub fn render_json(result: &ReconciliationResult) -> Result<String, ReconError> {
    serde_json::to_string_pretty(result)
        .map_err(|e| ReconError::Render(format!("JSON serialization error: {e}")))
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn header_lines(result: &ReconciliationResult) -> Vec<String> {
    vec![
        format!("Period: {} to {}", result.start_date, result.end_date),
        format!("Source A: {}", result.source_a),
        format!("Source B: {}", result.source_b),
    ]
}

fn summary_lines(result: &ReconciliationResult) -> Vec<String> {
    let s = &result.summary;
    let (a, b) = (&result.source_a, &result.source_b);
    let mut lines = vec![
        format!("Total transactions in {a}: {}", s.total_a),
        format!("Total transactions in {b}: {}", s.total_b),
        format!("Matching transactions: {}", s.matches),
        format!("Mismatched transactions: {}", s.mismatches),
        format!("Transactions only in {a}: {}", s.only_in_a),
        format!("Transactions only in {b}: {}", s.only_in_b),
    ];
    if s.duplicate_keys_a > 0 {
        lines.push(format!("Duplicate keys in {a}: {}", s.duplicate_keys_a));
    }
    if s.duplicate_keys_b > 0 {
        lines.push(format!("Duplicate keys in {b}: {}", s.duplicate_keys_b));
    }
    lines
}

/// One-line rendering of a record: key fields first, then whichever
/// [`DISPLAY_FIELDS`] the record carries.
pub fn format_record(record: &Record, key_fields: &[String]) -> String {
    let mut parts: Vec<String> = key_fields
        .iter()
        .map(|field| {
            let value = record.get(field).map(|v| v.to_string()).unwrap_or_default();
            format!("{field}={value}")
        })
        .collect();

    for field in DISPLAY_FIELDS {
        if key_fields.iter().any(|k| k == field) {
            continue;
        }
        if let Some(value) = record.get(field) {
            parts.push(format!("{field}={value}"));
        }
    }

    parts.join(", ")
}

fn one_sided_section(out: &mut Vec<String>, source: &str, records: &[Record], key_fields: &[String]) {
    if records.is_empty() {
        return;
    }
    out.push(format!("=== TRANSACTIONS ONLY IN {source} ==="));
    for (i, record) in records.iter().take(PREVIEW_LIMIT).enumerate() {
        out.push(format!("Transaction {}: {}", i + 1, format_record(record, key_fields)));
    }
    if records.len() > PREVIEW_LIMIT {
        out.push(format!("... and {} more transactions", records.len() - PREVIEW_LIMIT));
    }
    out.push(String::new());
}

pub fn render_text(result: &ReconciliationResult) -> String {
    let mut out = vec!["==== TRANSACTION RECONCILIATION REPORT ====".to_string()];
    out.extend(header_lines(result));
    out.push(String::new());

    out.push("=== SUMMARY ===".to_string());
    out.extend(summary_lines(result));
    out.push(String::new());

    if !result.mismatches.is_empty() {
        out.push("=== MISMATCHED TRANSACTIONS ===".to_string());
        for (i, entry) in result.mismatches.iter().take(PREVIEW_LIMIT).enumerate() {
            out.push(format!("Mismatch {}: Key = {}", i + 1, entry.key));
            for m in &entry.mismatches {
                out.push(format!("  {}: {} (A) vs {} (B)", m.field, m.value_a, m.value_b));
            }
            out.push(String::new());
        }
        if result.mismatches.len() > PREVIEW_LIMIT {
            out.push(format!(
                "... and {} more mismatches",
                result.mismatches.len() - PREVIEW_LIMIT
            ));
            out.push(String::new());
        }
    }

    one_sided_section(&mut out, &result.source_a, &result.only_in_a, &result.key_fields);
    one_sided_section(&mut out, &result.source_b, &result.only_in_b, &result.key_fields);

    out.join("\n")
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn csv_table<I>(header: &[String], rows: I) -> Result<String, ReconError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(header)
        .map_err(|e| ReconError::Render(e.to_string()))?;
    for row in rows {
        writer
            .write_record(&row)
            .map_err(|e| ReconError::Render(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ReconError::Render(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReconError::Render(e.to_string()))
}

/// Union of the records' field names, in first-seen order.
fn record_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

fn records_table(records: &[Record]) -> Result<String, ReconError> {
    let columns = record_columns(records);
    let rows = records.iter().map(|record| {
        columns
            .iter()
            .map(|c| record.get(c).map(|v| v.canonical()).unwrap_or_default())
            .collect::<Vec<String>>()
    });
    csv_table(&columns, rows)
}

pub fn render_csv(result: &ReconciliationResult) -> Result<String, ReconError> {
    let mut out = String::new();

    out.push_str("TRANSACTION RECONCILIATION REPORT\n");
    for line in header_lines(result) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');

    out.push_str("SUMMARY\n");
    for line in summary_lines(result) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');

    out.push_str("MISMATCHED TRANSACTIONS\n");
    if result.mismatches.is_empty() {
        out.push_str("No mismatches found.\n");
    } else {
        let header: Vec<String> = ["key", "field", "value_a", "value_b"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = result.mismatches.iter().flat_map(|entry| {
            entry.mismatches.iter().map(move |m| {
                vec![
                    entry.key.clone(),
                    m.field.clone(),
                    m.value_a.canonical(),
                    m.value_b.canonical(),
                ]
            })
        });
        out.push_str(&csv_table(&header, rows)?);
    }
    out.push('\n');

    for (source, records) in [
        (&result.source_a, &result.only_in_a),
        (&result.source_b, &result.only_in_b),
    ] {
        out.push_str(&format!("TRANSACTIONS ONLY IN {source}\n"));
        if records.is_empty() {
            out.push_str(&format!("No transactions found only in {source}.\n"));
        } else {
            out.push_str(&records_table(records)?);
        }
        out.push('\n');
    }

    Ok(out)
}
