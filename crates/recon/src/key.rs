use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{DuplicateKey, ReconError};
use crate::model::Record;

/// Separator between key components. Not expected to occur in key values.
pub const KEY_DELIMITER: char = '|';

/// Build the composite key of `record` from `key_fields`, in order.
///
/// Missing and null fields contribute an empty component; nothing is
/// normalized, so `"ABC"` and `"abc"` produce different keys.
pub fn build_key(record: &Record, key_fields: &[String]) -> String {
    let parts: Vec<String> = key_fields
        .iter()
        .map(|field| record.get(field).map(|v| v.canonical()).unwrap_or_default())
        .collect();
    parts.join(&KEY_DELIMITER.to_string())
}

// ---------------------------------------------------------------------------
// Duplicate policy
// ---------------------------------------------------------------------------

/// What the indexer does when two records of one source share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Later record overwrites the earlier one.
    #[default]
    KeepLast,
    KeepFirst,
    /// Abort the run, listing every duplicated key.
    Error,
    /// Keep every record; the n-th occurrence of `k` is indexed as `k#n`.
    KeepAll,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepLast => write!(f, "keep_last"),
            Self::KeepFirst => write!(f, "keep_first"),
            Self::Error => write!(f, "error"),
            Self::KeepAll => write!(f, "keep_all"),
        }
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Key → record map for one source.
#[derive(Debug, Default)]
pub struct SourceIndex {
    pub entries: BTreeMap<String, Record>,
    /// Keys that occurred more than once in the input, with their counts.
    pub duplicates: Vec<DuplicateKey>,
}

impl SourceIndex {
    pub fn keys(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Index `records` by composite key in input order.
pub fn index_records(
    source: &str,
    records: Vec<Record>,
    key_fields: &[String],
    policy: DuplicatePolicy,
) -> Result<SourceIndex, ReconError> {
    let mut entries: BTreeMap<String, Record> = BTreeMap::new();
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();

    for record in records {
        let key = build_key(&record, key_fields);
        let count = seen.entry(key.clone()).or_insert(0);
        *count += 1;

        match policy {
            DuplicatePolicy::KeepLast | DuplicatePolicy::Error => {
                entries.insert(key, record);
            }
            DuplicatePolicy::KeepFirst => {
                entries.entry(key).or_insert(record);
            }
            DuplicatePolicy::KeepAll => {
                // A suffixed slot can clash with a real key such as "1#2";
                // move on to the next free suffix instead of overwriting.
                let mut n = *count;
                let mut slot = if n == 1 { key.clone() } else { format!("{key}#{n}") };
                while entries.contains_key(&slot) {
                    n += 1;
                    slot = format!("{key}#{n}");
                }
                entries.insert(slot, record);
            }
        }
    }

    let duplicates: Vec<DuplicateKey> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, count)| DuplicateKey {
            source: source.to_string(),
            key,
            count,
        })
        .collect();

    if policy == DuplicatePolicy::Error && !duplicates.is_empty() {
        return Err(ReconError::DuplicateKeys(duplicates));
    }

    Ok(SourceIndex { entries, duplicates })
}
