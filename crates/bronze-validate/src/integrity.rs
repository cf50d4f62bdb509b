//! Uniqueness and foreign-key checks.
//!
//! Foreign keys are checked against the run's [`ReferenceCache`] rather than
//! live constraints, so a rule can only be evaluated once its reference
//! dataset has been loaded earlier in the same run.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, error, warn};

use bronze_model::frame::ROW_ID_FIELD;
use bronze_model::{
    FindingStatus, ForeignKeyFinding, ForeignKeyRule, Frame, IntegrityReport, ReferenceCache,
    Row, RowSnapshot, SAMPLE_LIMIT, TargetTable, UniqueFinding,
};

use crate::checks::evaluate_row_checks;

fn sample_row(row: &Row, columns: &[String]) -> RowSnapshot {
    let mut snapshot = Frame::snapshot_columns(row, columns);
    snapshot.insert(
        ROW_ID_FIELD.to_string(),
        serde_json::Value::from(row.id().get()),
    );
    snapshot
}

/// Checks that `columns` identify rows uniquely.
///
/// Nulls in `nullable` columns are reported but tolerated, and rows holding
/// them are left out of the duplicate search. Nulls anywhere else fail the
/// check.
pub fn check_unique(
    frame: &Frame,
    columns: &[String],
    nullable: &BTreeSet<String>,
) -> UniqueFinding {
    let mut finding = UniqueFinding::new(
        columns.to_vec(),
        columns
            .iter()
            .filter(|column| nullable.contains(*column))
            .cloned()
            .collect(),
    );
    if columns.is_empty() {
        return finding;
    }
    let mut messages = Vec::new();

    for column in &finding.nullable_columns {
        let nulls = frame.null_count(column);
        if nulls > 0 {
            finding.nullable_null_counts.insert(column.clone(), nulls);
        }
    }

    let strict: Vec<&String> = columns
        .iter()
        .filter(|column| !nullable.contains(*column))
        .collect();
    let null_rows: Vec<&Row> = frame
        .rows()
        .iter()
        .filter(|row| strict.iter().any(|column| row.is_null(column)))
        .collect();
    if !null_rows.is_empty() {
        finding.null_count = null_rows.len();
        finding.null_sample = null_rows
            .iter()
            .take(SAMPLE_LIMIT)
            .map(|row| sample_row(row, columns))
            .collect();
        messages.push(format!(
            "{} row(s) with null values in non-nullable key columns",
            null_rows.len()
        ));
    }

    let mut groups: HashMap<Vec<Option<String>>, Vec<&Row>> = HashMap::new();
    let mut order = Vec::new();
    for row in frame.rows() {
        if finding
            .nullable_columns
            .iter()
            .any(|column| row.is_null(column))
        {
            continue;
        }
        let key = row.key_with_nulls(columns);
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(row);
    }
    let duplicates: Vec<&Row> = order
        .iter()
        .filter_map(|key| groups.get(key))
        .filter(|group| group.len() > 1)
        .flatten()
        .copied()
        .collect();
    if !duplicates.is_empty() {
        finding.duplicate_count = duplicates.len();
        finding.duplicate_sample = duplicates
            .iter()
            .take(SAMPLE_LIMIT)
            .map(|row| sample_row(row, columns))
            .collect();
        messages.push(format!(
            "{} row(s) share a key with another row",
            duplicates.len()
        ));
    }

    if !messages.is_empty() {
        finding.status = FindingStatus::Failed;
        finding.message = Some(messages.join("; "));
        error!(
            dataset = %frame.name(),
            columns = %columns.join(", "),
            nulls = finding.null_count,
            duplicates = finding.duplicate_count,
            "unique constraint violated"
        );
    }
    finding
}

/// Checks one foreign-key rule against the cached reference snapshot.
///
/// The rule is skipped when the reference has not been loaded in this run
/// or the frame lacks the target columns. Rows with a null in any target
/// column are never matched; with `allow_null` they are reported as an
/// informational count and sample.
pub fn check_foreign_key(
    frame: &Frame,
    rule: &ForeignKeyRule,
    cache: &ReferenceCache,
    context_columns: &[String],
) -> ForeignKeyFinding {
    let mut finding = ForeignKeyFinding {
        target_columns: rule.columns.clone(),
        reference_dataset: rule.reference_dataset.clone(),
        reference_columns: rule.reference_columns.clone(),
        allow_null: rule.allow_null,
        status: FindingStatus::Skipped,
        reason: None,
        null_count: 0,
        null_sample: Vec::new(),
        unmatched_count: 0,
        sample_unmatched_rows: Vec::new(),
    };

    let Some(reference) = cache
        .get(&rule.reference_dataset)
        .filter(|snapshot| !snapshot.is_empty())
    else {
        debug!(
            dataset = %frame.name(),
            reference = %rule.reference_dataset,
            "skipping foreign key check: reference data unavailable"
        );
        finding.reason = Some("reference_missing".to_string());
        return finding;
    };
    if !frame.has_columns(&rule.columns) {
        debug!(
            dataset = %frame.name(),
            columns = %rule.columns.join(", "),
            "skipping foreign key check: target columns missing"
        );
        finding.reason = Some("target_missing".to_string());
        return finding;
    }
    let Some(reference_keys) = reference.tuple_set(&rule.reference_columns) else {
        finding.reason = Some("reference_columns_missing".to_string());
        return finding;
    };

    let mut sample_columns = rule.columns.clone();
    for column in frame.present_columns(context_columns) {
        if !sample_columns.contains(&column) {
            sample_columns.push(column);
        }
    }

    let mut checked = 0;
    let mut seen_unmatched: HashSet<Vec<String>> = HashSet::new();
    for row in frame.rows() {
        let Some(key) = row.key(&rule.columns) else {
            if rule.allow_null {
                finding.null_count += 1;
                if finding.null_sample.len() < SAMPLE_LIMIT {
                    finding.null_sample.push(sample_row(row, &sample_columns));
                }
            }
            continue;
        };
        checked += 1;
        if reference_keys.contains(&key) || !seen_unmatched.insert(key) {
            continue;
        }
        if finding.sample_unmatched_rows.len() < SAMPLE_LIMIT {
            finding
                .sample_unmatched_rows
                .push(sample_row(row, &sample_columns));
        }
    }
    finding.unmatched_count = seen_unmatched.len();

    if checked == 0 {
        finding.status = FindingStatus::Passed;
        finding.reason = Some("no rows to validate".to_string());
    } else if finding.unmatched_count > 0 {
        finding.status = FindingStatus::Failed;
        warn!(
            dataset = %frame.name(),
            columns = %rule.columns.join(", "),
            reference = %rule.reference_dataset,
            unmatched = finding.unmatched_count,
            "foreign key validation failed"
        );
    } else {
        finding.status = FindingStatus::Passed;
    }
    finding
}

/// Runs row checks, the target's unique constraint and every foreign-key
/// rule for one dataset.
pub fn run_integrity<S: AsRef<str>>(
    frame: &Frame,
    target: &TargetTable,
    rules: &[ForeignKeyRule],
    cache: &ReferenceCache,
    fk_context: &[String],
    row_checks: &[S],
) -> IntegrityReport {
    let unique = (!target.unique_columns.is_empty()).then(|| {
        check_unique(
            frame,
            &target.unique_columns,
            &target.nullable_unique_columns,
        )
    });
    IntegrityReport {
        unique,
        foreign_keys: rules
            .iter()
            .map(|rule| check_foreign_key(frame, rule, cache, fk_context))
            .collect(),
        row_checks: evaluate_row_checks(frame, row_checks),
    }
}
