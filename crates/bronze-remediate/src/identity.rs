//! Identity policies for rows whose identifier is null or unknown.
//!
//! Which policy applies is configured per dataset ([`IdentityPolicy`]):
//! some datasets drop such rows, some keep them with a null identity and
//! some cannot be loaded at all while an identity is missing.

use std::collections::{BTreeSet, HashSet};

use tracing::warn;

use bronze_model::{
    Frame, IdentityPolicy, IssueLedger, IssueType, LoadError, RemediationEvent, Result, Row,
    RowSnapshot, SAMPLE_LIMIT, Value,
};

use crate::ops::row_snapshot;

/// Where an identity column points and what to do when it does not resolve.
#[derive(Debug, Clone, Copy)]
pub struct IdentityRule<'a> {
    pub column: &'a str,
    pub reference_dataset: &'a str,
    pub policy: IdentityPolicy,
}

fn unresolved(frame: &Frame, column: &str, rows: &[&Row]) -> LoadError {
    LoadError::UnresolvedIdentity {
        dataset: frame.name().to_string(),
        column: column.to_string(),
        count: rows.len(),
        sample: rows
            .iter()
            .take(SAMPLE_LIMIT)
            .map(|row| frame.snapshot(row))
            .collect(),
    }
}

/// Applies `rule` to rows whose identity is absent from `known`.
///
/// Under `Drop` null identities count as unknown and are removed too;
/// under `RetainNull` unknown values are nulled and existing nulls are left
/// alone. Returns the number of rows affected.
pub fn enforce_known_identities(
    frame: &mut Frame,
    rule: IdentityRule<'_>,
    known: &HashSet<String>,
    ledger: &mut IssueLedger,
) -> Result<usize> {
    if !frame.has_column(rule.column) {
        return Ok(0);
    }
    let is_unknown = |row: &Row| match row.get(rule.column).key_text() {
        Some(id) => !known.contains(&id),
        None => rule.policy != IdentityPolicy::RetainNull,
    };
    let before = frame.height();
    match rule.policy {
        IdentityPolicy::Require => {
            let offending: Vec<&Row> = frame.rows().iter().filter(|row| is_unknown(*row)).collect();
            if offending.is_empty() {
                Ok(0)
            } else {
                Err(unresolved(frame, rule.column, &offending))
            }
        }
        IdentityPolicy::Drop => {
            let removed = frame.retain(|row| !is_unknown(row));
            if removed.is_empty() {
                return Ok(0);
            }
            let distinct: BTreeSet<String> = removed
                .iter()
                .map(|row| row.get(rule.column).to_string())
                .collect();
            warn!(
                dataset = %frame.name(),
                column = rule.column,
                reference = rule.reference_dataset,
                rows = removed.len(),
                "dropped rows with unknown identity"
            );
            let snapshots: Vec<RowSnapshot> = removed.iter().map(|row| frame.snapshot(row)).collect();
            ledger.record(
                RemediationEvent::new(
                    frame.name(),
                    IssueType::RowsDroppedMissingReference,
                    format!(
                        "dropped {} row(s) whose {} is not present in {}",
                        removed.len(),
                        rule.column,
                        rule.reference_dataset
                    ),
                )
                .with_affected(removed.len())
                .with_row_counts(before, frame.height())
                .with_before(snapshots)
                .with_detail("column", rule.column)
                .with_detail("reference_dataset", rule.reference_dataset)
                .with_detail(
                    "distinct_values",
                    distinct.into_iter().take(SAMPLE_LIMIT).collect::<Vec<_>>(),
                ),
            );
            Ok(removed.len())
        }
        IdentityPolicy::RetainNull => {
            let mut originals = Vec::new();
            let mut results = Vec::new();
            let mut distinct = BTreeSet::new();
            let columns = frame.columns().to_vec();
            for row in frame.rows_mut() {
                if !is_unknown(&*row) {
                    continue;
                }
                let original = row_snapshot(row, &columns);
                distinct.insert(row.get(rule.column).to_string());
                row.set(rule.column, Value::Null);
                let mut result = original.clone();
                result.insert(rule.column.to_string(), serde_json::Value::Null);
                originals.push(original);
                results.push(result);
            }
            if originals.is_empty() {
                return Ok(0);
            }
            let affected = originals.len();
            warn!(
                dataset = %frame.name(),
                column = rule.column,
                reference = rule.reference_dataset,
                rows = affected,
                "nulled identities not found in reference"
            );
            ledger.record(
                RemediationEvent::new(
                    frame.name(),
                    IssueType::InvalidTargetDropped,
                    format!(
                        "nulled {affected} {} value(s) not present in {}",
                        rule.column, rule.reference_dataset
                    ),
                )
                .with_affected(affected)
                .with_before(originals)
                .with_after(results)
                .with_detail("column", rule.column)
                .with_detail("reference_dataset", rule.reference_dataset)
                .with_detail(
                    "distinct_targets",
                    distinct.into_iter().take(SAMPLE_LIMIT).collect::<Vec<_>>(),
                ),
            );
            Ok(affected)
        }
    }
}

/// Applies `policy` to rows whose `column` is null.
///
/// `context` selects the columns copied into the audit sample. Returns the
/// number of rows affected.
pub fn enforce_null_identities(
    frame: &mut Frame,
    column: &str,
    policy: IdentityPolicy,
    context: &[String],
    ledger: &mut IssueLedger,
) -> Result<usize> {
    if !frame.has_column(column) {
        return Ok(0);
    }
    let before = frame.height();
    match policy {
        IdentityPolicy::Require => {
            let missing: Vec<&Row> = frame.rows().iter().filter(|row| row.is_null(column)).collect();
            if missing.is_empty() {
                Ok(0)
            } else {
                Err(unresolved(frame, column, &missing))
            }
        }
        IdentityPolicy::Drop => {
            let removed = frame.retain(|row| !row.is_null(column));
            if removed.is_empty() {
                return Ok(0);
            }
            let snapshots: Vec<RowSnapshot> = removed.iter().map(|row| frame.snapshot(row)).collect();
            ledger.record(
                RemediationEvent::new(
                    frame.name(),
                    IssueType::RowsDroppedMissingReference,
                    format!("dropped {} row(s) without {column}", removed.len()),
                )
                .with_affected(removed.len())
                .with_row_counts(before, frame.height())
                .with_before(snapshots)
                .with_detail("column", column),
            );
            Ok(removed.len())
        }
        IdentityPolicy::RetainNull => {
            let missing: Vec<&Row> = frame.rows().iter().filter(|row| row.is_null(column)).collect();
            if missing.is_empty() {
                return Ok(0);
            }
            let count = missing.len();
            warn!(dataset = %frame.name(), column, rows = count, "rows retain a null identity");
            let sample_columns: Vec<String> = if context.is_empty() {
                frame.columns().to_vec()
            } else {
                frame.present_columns(context)
            };
            let sample: Vec<RowSnapshot> = missing
                .iter()
                .take(SAMPLE_LIMIT)
                .map(|row| Frame::snapshot_columns(row, &sample_columns))
                .collect();
            ledger.record(
                RemediationEvent::new(
                    frame.name(),
                    IssueType::NullIdentityRetained,
                    format!("{count} row(s) kept with a null {column}"),
                )
                .with_affected(count)
                .with_before(sample)
                .with_detail("column", column),
            );
            Ok(count)
        }
    }
}
