use chrono::NaiveDate;

use crate::compare::{compare, default_comparison_fields, observed_fields};
use crate::error::ReconError;
use crate::key::{index_records, DuplicatePolicy};
use crate::matcher::{partition, Partition};
use crate::model::{MatchEntry, MismatchEntry, Record, ReconMeta, ReconSummary, ReconciliationResult};
use crate::source::DataSource;

/// Parameters of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub key_fields: Vec<String>,
    /// Fields to compare. `None` (or an empty list) selects the default:
    /// fields present on both sides, minus the key fields.
    pub comparison_fields: Option<Vec<String>>,
    pub on_duplicate: DuplicatePolicy,
    /// Fetch both sources on separate threads.
    pub parallel_fetch: bool,
}

impl ReconOptions {
    pub fn new(start: NaiveDate, end: NaiveDate, key_fields: Vec<String>) -> Self {
        Self {
            start,
            end,
            key_fields,
            comparison_fields: None,
            on_duplicate: DuplicatePolicy::default(),
            parallel_fetch: true,
        }
    }

    pub fn with_comparison_fields(mut self, fields: Vec<String>) -> Self {
        self.comparison_fields = Some(fields);
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.on_duplicate = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.key_fields.is_empty() {
            return Err(ReconError::invalid("at least one key field is required"));
        }
        if self.key_fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ReconError::invalid("key field names must not be blank"));
        }
        if let Some(fields) = &self.comparison_fields {
            if fields.iter().any(|f| f.trim().is_empty()) {
                return Err(ReconError::invalid("comparison field names must not be blank"));
            }
        }
        if self.start > self.end {
            return Err(ReconError::invalid(format!(
                "start date {} is after end date {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Explicitly requested comparison fields, if any.
    fn explicit_fields(&self) -> Option<&[String]> {
        self.comparison_fields
            .as_deref()
            .filter(|fields| !fields.is_empty())
    }
}

/// Records fetched from one source, plus the field names it advertises.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub name: String,
    pub records: Vec<Record>,
    pub listed_fields: Vec<String>,
}

impl FetchedSource {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
            listed_fields: Vec::new(),
        }
    }
}

/// Fetch both sources and reconcile them. Any fetch failure aborts the run.
pub fn reconcile(
    source_a: &dyn DataSource,
    source_b: &dyn DataSource,
    options: &ReconOptions,
) -> Result<ReconciliationResult, ReconError> {
    options.validate()?;
    let (fetched_a, fetched_b) = fetch_both(source_a, source_b, options)?;
    reconcile_fetched(fetched_a, fetched_b, options)
}

/// Reconcile records that were already fetched.
pub fn reconcile_fetched(
    a: FetchedSource,
    b: FetchedSource,
    options: &ReconOptions,
) -> Result<ReconciliationResult, ReconError> {
    options.validate()?;

    let comparison_fields = match options.explicit_fields() {
        Some(fields) => fields.to_vec(),
        None => {
            let fields_a = observed_fields(&a.records, &a.listed_fields);
            let fields_b = observed_fields(&b.records, &b.listed_fields);
            default_comparison_fields(&fields_a, &fields_b, &options.key_fields)
        }
    };

    let total_a = a.records.len();
    let total_b = b.records.len();

    let mut index_a = index_records(&a.name, a.records, &options.key_fields, options.on_duplicate)?;
    let mut index_b = index_records(&b.name, b.records, &options.key_fields, options.on_duplicate)?;

    let Partition { common, only_a, only_b } = partition(&index_a.keys(), &index_b.keys());

    let mut matches = Vec::new();
    let mut mismatches = Vec::new();

    for key in common {
        let (Some(record_a), Some(record_b)) =
            (index_a.entries.remove(&key), index_b.entries.remove(&key))
        else {
            continue;
        };

        let field_mismatches = compare(&record_a, &record_b, &comparison_fields);
        if field_mismatches.is_empty() {
            matches.push(MatchEntry { key, record_a, record_b });
        } else {
            mismatches.push(MismatchEntry {
                key,
                record_a,
                record_b,
                mismatches: field_mismatches,
            });
        }
    }

    let only_in_a: Vec<Record> = only_a.iter().filter_map(|k| index_a.entries.remove(k)).collect();
    let only_in_b: Vec<Record> = only_b.iter().filter_map(|k| index_b.entries.remove(k)).collect();

    let summary = ReconSummary {
        total_a,
        total_b,
        matches: matches.len(),
        mismatches: mismatches.len(),
        only_in_a: only_in_a.len(),
        only_in_b: only_in_b.len(),
        duplicate_keys_a: index_a.duplicates.len(),
        duplicate_keys_b: index_b.duplicates.len(),
    };

    Ok(ReconciliationResult {
        meta: ReconMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        start_date: options.start,
        end_date: options.end,
        source_a: a.name,
        source_b: b.name,
        key_fields: options.key_fields.clone(),
        comparison_fields,
        summary,
        matches,
        mismatches,
        only_in_a,
        only_in_b,
    })
}

fn fetch_both(
    source_a: &dyn DataSource,
    source_b: &dyn DataSource,
    options: &ReconOptions,
) -> Result<(FetchedSource, FetchedSource), ReconError> {
    if !options.parallel_fetch {
        let fetched_a = fetch_one(source_a, options)?;
        let fetched_b = fetch_one(source_b, options)?;
        return Ok((fetched_a, fetched_b));
    }

    let (result_a, result_b) = std::thread::scope(|scope| {
        let handle_b = scope.spawn(|| fetch_one(source_b, options));
        let result_a = fetch_one(source_a, options);
        let result_b = match handle_b.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (result_a, result_b)
    });

    Ok((result_a?, result_b?))
}

fn fetch_one(source: &dyn DataSource, options: &ReconOptions) -> Result<FetchedSource, ReconError> {
    let records = source.fetch_transactions(options.start, options.end)?;
    let listed_fields = if options.explicit_fields().is_none() {
        source.list_fields()
    } else {
        Vec::new()
    };
    Ok(FetchedSource {
        name: source.name().to_string(),
        records,
        listed_fields,
    })
}
