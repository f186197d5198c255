// Property-based tests for the reconciliation engine.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeSet;

use chrono::NaiveDate;
use proptest::prelude::*;
use tally_recon::compare::normalize;
use tally_recon::key::build_key;
use tally_recon::{reconcile_fetched, FetchedSource, ReconOptions, ReconciliationResult, Record, Value};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Amount: integers, floats or null.
fn arb_amount() -> impl Strategy<Value = Value> {
    prop_oneof![
        2 => (-100_000i64..100_000).prop_map(Value::Integer),
        2 => (-1000.0..1000.0f64).prop_map(Value::Float),
        1 => Just(Value::Null),
    ]
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|i| Value::Integer(i64::from(i))),
        (-1.0e6..1.0e6f64).prop_map(Value::Float),
        r"[ a-zA-Z0-9]{0,12}".prop_map(Value::String),
    ]
}

fn arb_currency() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("USD"), Just(" usd"), Just("EUR"), Just("eur "), Just("")]
}

/// One side: unique keys drawn from a small pool, so sides overlap often.
fn arb_side() -> impl Strategy<Value = Vec<Record>> {
    proptest::collection::btree_map(r"[a-f][0-9]?", (arb_amount(), arb_currency()), 0..16).prop_map(
        |rows| {
            rows.into_iter()
                .map(|(id, (amount, currency))| {
                    Record::new()
                        .with("id", id)
                        .with("amount", amount)
                        .with("currency", currency)
                })
                .collect()
        },
    )
}

fn options() -> ReconOptions {
    ReconOptions::new(
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        vec!["id".to_string()],
    )
}

fn run(a: &[Record], b: &[Record]) -> ReconciliationResult {
    reconcile_fetched(
        FetchedSource::new("a", a.to_vec()),
        FetchedSource::new("b", b.to_vec()),
        &options(),
    )
    .unwrap()
}

fn ids(records: &[Record]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|r| r.get("id").map(|v| v.canonical()))
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn every_key_lands_in_exactly_one_bucket(a in arb_side(), b in arb_side()) {
        let result = run(&a, &b);
        let s = &result.summary;

        prop_assert_eq!(s.total_a, a.len());
        prop_assert_eq!(s.total_b, b.len());
        prop_assert_eq!(s.matches + s.mismatches + s.only_in_a, a.len());
        prop_assert_eq!(s.matches + s.mismatches + s.only_in_b, b.len());

        let common: BTreeSet<String> = ids(&a).intersection(&ids(&b)).cloned().collect();
        let paired: BTreeSet<String> = result
            .matches
            .iter()
            .map(|m| m.key.clone())
            .chain(result.mismatches.iter().map(|m| m.key.clone()))
            .collect();
        prop_assert_eq!(paired, common);

        for record in &result.only_in_a {
            let id = record.get("id").map(|v| v.canonical()).unwrap_or_default();
            prop_assert!(!ids(&b).contains(&id));
        }
    }

    #[test]
    fn swapping_sides_mirrors_buckets(a in arb_side(), b in arb_side()) {
        let forward = run(&a, &b);
        let backward = run(&b, &a);

        prop_assert_eq!(forward.summary.matches, backward.summary.matches);
        prop_assert_eq!(forward.summary.mismatches, backward.summary.mismatches);
        prop_assert_eq!(&forward.only_in_a, &backward.only_in_b);
        prop_assert_eq!(&forward.only_in_b, &backward.only_in_a);

        for (f, r) in forward.mismatches.iter().zip(backward.mismatches.iter()) {
            prop_assert_eq!(&f.key, &r.key);
            prop_assert_eq!(f.mismatches.len(), r.mismatches.len());
            for (fm, rm) in f.mismatches.iter().zip(r.mismatches.iter()) {
                prop_assert_eq!(&fm.field, &rm.field);
                prop_assert_eq!(&fm.value_a, &rm.value_b);
                prop_assert_eq!(&fm.value_b, &rm.value_a);
            }
        }
    }

    #[test]
    fn side_against_itself_is_clean(a in arb_side()) {
        let result = run(&a, &a);
        prop_assert_eq!(result.summary.matches, a.len());
        prop_assert!(result.summary.is_clean());
    }

    #[test]
    fn repeated_runs_agree(a in arb_side(), b in arb_side()) {
        let r1 = run(&a, &b);
        let r2 = run(&a, &b);

        prop_assert_eq!(&r1.summary, &r2.summary);
        prop_assert_eq!(&r1.comparison_fields, &r2.comparison_fields);
        prop_assert_eq!(&r1.matches, &r2.matches);
        prop_assert_eq!(&r1.mismatches, &r2.mismatches);
        prop_assert_eq!(&r1.only_in_a, &r2.only_in_a);
        prop_assert_eq!(&r1.only_in_b, &r2.only_in_b);
    }

    #[test]
    fn normalization_is_idempotent(v in arb_scalar()) {
        let once = normalize(&v);
        let twice = normalize(&Value::from(once.clone()));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn key_ignores_insertion_order(
        fields in proptest::collection::btree_map(r"[a-d]", arb_scalar(), 1..5),
    ) {
        let forward: Record = fields.clone().into_iter().collect();
        let backward: Record = fields.clone().into_iter().rev().collect();
        let keys: Vec<String> = fields.keys().cloned().collect();
        prop_assert_eq!(build_key(&forward, &keys), build_key(&backward, &keys));
    }
}
