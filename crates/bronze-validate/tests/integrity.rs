use std::collections::BTreeSet;

use bronze_model::{
    FindingStatus, ForeignKeyRule, Frame, ReferenceCache, ReferenceSnapshot, Value,
};
use bronze_validate::{check_foreign_key, check_unique, evaluate_row_checks};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn castaway_cache() -> ReferenceCache {
    let details = Frame::from_rows(
        "castaway_details",
        ["castaway_id", "full_name"],
        vec![
            vec![Value::from("US0001"), Value::from("Sonja Christopher")],
            vec![Value::from("US0002"), Value::from("B.B. Andersen")],
        ],
    );
    let mut cache = ReferenceCache::new();
    cache.register(
        ReferenceSnapshot::from_frame(&details, &strings(&["castaway_id"])).expect("snapshot"),
    );
    cache
}

#[test]
fn nullable_columns_may_repeat_nulls() {
    let frame = Frame::from_rows(
        "boot_mapping",
        ["version_season", "boot_mapping_order", "castaway_id"],
        vec![
            vec![Value::from("US01"), Value::from(1), Value::Null],
            vec![Value::from("US01"), Value::from(1), Value::Null],
            vec![Value::from("US01"), Value::from(2), Value::from("US0001")],
        ],
    );
    let columns = strings(&["version_season", "boot_mapping_order", "castaway_id"]);
    let nullable: BTreeSet<String> = strings(&["castaway_id"]).into_iter().collect();
    let finding = check_unique(&frame, &columns, &nullable);
    assert_eq!(finding.status, FindingStatus::Passed);
    assert_eq!(finding.nullable_null_counts["castaway_id"], 2);
}

#[test]
fn non_null_duplicates_fail_even_with_nullable_columns() {
    let frame = Frame::from_rows(
        "boot_mapping",
        ["version_season", "boot_mapping_order", "castaway_id"],
        vec![
            vec![Value::from("US01"), Value::from(2), Value::from("US0001")],
            vec![Value::from("US01"), Value::from(2.0), Value::from("US0001")],
            vec![Value::from("US01"), Value::from(3), Value::from("US0002")],
        ],
    );
    let columns = strings(&["version_season", "boot_mapping_order", "castaway_id"]);
    let nullable: BTreeSet<String> = strings(&["castaway_id"]).into_iter().collect();
    let finding = check_unique(&frame, &columns, &nullable);
    assert!(finding.failed());
    assert_eq!(finding.duplicate_count, 2);
    assert_eq!(finding.duplicate_sample.len(), 2);
    assert!(finding.duplicate_sample[0].contains_key("_row_id"));
}

#[test]
fn nulls_in_strict_key_columns_fail() {
    let frame = Frame::from_rows(
        "castaways",
        ["version_season", "castaway_id"],
        vec![
            vec![Value::from("US01"), Value::Null],
            vec![Value::from("US01"), Value::from("US0002")],
        ],
    );
    let finding = check_unique(
        &frame,
        &strings(&["version_season", "castaway_id"]),
        &BTreeSet::new(),
    );
    assert!(finding.failed());
    assert_eq!(finding.null_count, 1);
    assert_eq!(finding.duplicate_count, 0);
}

#[test]
fn foreign_key_is_skipped_without_reference() {
    let frame = Frame::from_rows(
        "journeys",
        ["castaway_id"],
        vec![vec![Value::from("US9999")]],
    );
    let rule = ForeignKeyRule::new(&["castaway_id"], "castaway_details", &["castaway_id"]);
    let finding = check_foreign_key(&frame, &rule, &ReferenceCache::new(), &[]);
    assert_eq!(finding.status, FindingStatus::Skipped);
    assert_eq!(finding.reason.as_deref(), Some("reference_missing"));

    let missing_column = Frame::from_rows("journeys", ["sog_id"], vec![vec![Value::from(1)]]);
    let finding = check_foreign_key(&missing_column, &rule, &castaway_cache(), &[]);
    assert_eq!(finding.reason.as_deref(), Some("target_missing"));
}

#[test]
fn unmatched_keys_fail_with_deduplicated_context_sample() {
    let frame = Frame::from_rows(
        "vote_history",
        ["castaway_id", "episode"],
        vec![
            vec![Value::from("US0001"), Value::from(1)],
            vec![Value::from("US9999"), Value::from(1)],
            vec![Value::from("US9999"), Value::from(2)],
            vec![Value::Null, Value::from(3)],
        ],
    );
    let rule =
        ForeignKeyRule::new(&["castaway_id"], "castaway_details", &["castaway_id"]).allow_null();
    let finding = check_foreign_key(&frame, &rule, &castaway_cache(), &strings(&["episode"]));
    assert_eq!(finding.status, FindingStatus::Failed);
    assert_eq!(finding.unmatched_count, 1);
    assert_eq!(finding.sample_unmatched_rows.len(), 1);
    assert_eq!(
        finding.sample_unmatched_rows[0]["episode"],
        serde_json::json!(1)
    );
    assert_eq!(finding.null_count, 1);
    assert_eq!(finding.null_sample[0]["episode"], serde_json::json!(3));
}

#[test]
fn row_checks_count_missing_and_duplicate_values() {
    let frame = Frame::from_rows(
        "castaway_details",
        ["castaway_id"],
        vec![
            vec![Value::from("US0001")],
            vec![Value::from("US0001")],
            vec![Value::Null],
        ],
    );
    let results = evaluate_row_checks(
        &frame,
        &[
            "missing_count(castaway_id) = 1",
            "duplicate_count(castaway_id) = 0",
            "missing_count(full_name) = 0",
            "rows_between(1, 2)",
        ],
    );
    assert!(results[0].passed);
    assert!(!results[1].passed);
    assert_eq!(results[1].observed, Some(1));
    assert!(!results[2].passed);
    assert_eq!(results[2].observed, None);
    assert_eq!(results[3].message.as_deref(), Some("unsupported rule syntax"));
}
