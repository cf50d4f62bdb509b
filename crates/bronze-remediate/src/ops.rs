//! Column-level operations shared by the dataset rules.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use bronze_model::frame::ROW_ID_FIELD;
use bronze_model::{
    Frame, IssueLedger, IssueType, RemediationEvent, Row, RowSnapshot, SAMPLE_LIMIT, Value,
};

const NULL_IDENTIFIERS: [&str; 4] = ["", "none", "null", "nan"];

/// Trims an identifier; textual null markers collapse to `Null`.
pub fn clean_identifier(value: &Value) -> Value {
    let Some(text) = value.key_text() else {
        return Value::Null;
    };
    if NULL_IDENTIFIERS.contains(&text.to_lowercase().as_str()) {
        Value::Null
    } else {
        Value::Text(text)
    }
}

pub fn clean_identifier_column(frame: &mut Frame, column: &str) {
    frame.map_column(column, clean_identifier);
}

/// Trims a display text; blanks become `Null`.
pub fn clean_text(value: &Value) -> Value {
    match value.key_text() {
        Some(text) if !text.is_empty() => Value::Text(text),
        _ => Value::Null,
    }
}

pub fn trim_text_column(frame: &mut Frame, column: &str) {
    frame.map_column(column, clean_text);
}

/// Renames the upstream `order` column to the dataset-specific name.
pub fn rename_order_column(frame: &mut Frame, to: &str) {
    if frame.rename_column("order", to) {
        tracing::debug!(dataset = %frame.name(), column = to, "renamed order column");
    }
}

/// Keeps existing `source_dataset` values and fills the rest with the
/// dataset name.
pub fn fill_source_dataset(frame: &mut Frame) {
    let name = Value::text(frame.name());
    if !frame.add_column("source_dataset", &name) {
        frame.map_column("source_dataset", |value| {
            if value.is_null() {
                name.clone()
            } else {
                value.clone()
            }
        });
    }
}

/// Snapshot of a row that may be mutably borrowed from its frame.
pub(crate) fn row_snapshot(row: &Row, columns: &[String]) -> RowSnapshot {
    let mut snapshot = Frame::snapshot_columns(row, columns);
    snapshot.insert(
        ROW_ID_FIELD.to_string(),
        serde_json::Value::from(row.id().get()),
    );
    snapshot
}

/// Canonical grouping key where nulls compare equal to each other.
fn group_key(row: &Row, columns: &[String]) -> Vec<Option<String>> {
    row.key_with_nulls(columns)
}

/// Removes rows repeating an earlier row over `subset` (first one wins).
///
/// Columns missing from the frame are ignored. Records one
/// `deduplicated_rows` event with the removed rows and the rows retained in
/// their place. Returns the number of rows removed.
pub fn deduplicate(frame: &mut Frame, subset: &[String], ledger: &mut IssueLedger) -> usize {
    let columns = frame.present_columns(subset);
    if columns.is_empty() || frame.is_empty() {
        return 0;
    }
    let before = frame.height();
    let mut first_seen: HashMap<Vec<Option<String>>, RowSnapshot> = HashMap::new();
    let mut kept_snapshots: Vec<RowSnapshot> = Vec::new();
    let mut kept_keys: HashSet<Vec<Option<String>>> = HashSet::new();
    let mut removed_ids = HashSet::new();
    let mut removed_snapshots: Vec<RowSnapshot> = Vec::new();
    for row in frame.rows() {
        let key = group_key(row, &columns);
        match first_seen.get(&key) {
            Some(kept) => {
                if kept_keys.insert(key) {
                    kept_snapshots.push(kept.clone());
                }
                removed_ids.insert(row.id());
                removed_snapshots.push(frame.snapshot(row));
            }
            None => {
                first_seen.insert(key, frame.snapshot(row));
            }
        }
    }
    if removed_ids.is_empty() {
        return 0;
    }
    frame.retain(|row| !removed_ids.contains(&row.id()));
    let removed = removed_ids.len();
    info!(
        dataset = %frame.name(),
        removed,
        subset = ?columns,
        "removed duplicate rows"
    );
    ledger.record(
        RemediationEvent::new(
            frame.name(),
            IssueType::DeduplicatedRows,
            format!("removed {removed} duplicate row(s) over {}", columns.join(", ")),
        )
        .with_affected(removed)
        .with_row_counts(before, frame.height())
        .with_before(removed_snapshots)
        .with_after(kept_snapshots)
        .with_detail("rows_removed", removed)
        .with_detail("subset_columns", columns),
    );
    removed
}

/// Reports rows that repeat over `subset` without removing any of them.
///
/// Every row of a duplicated group counts. Returns that count.
pub fn detect_duplicates(frame: &Frame, subset: &[String], ledger: &mut IssueLedger) -> usize {
    let columns = frame.present_columns(subset);
    if columns.is_empty() {
        return 0;
    }
    let mut groups: HashMap<Vec<Option<String>>, usize> = HashMap::new();
    for row in frame.rows() {
        *groups.entry(group_key(row, &columns)).or_default() += 1;
    }
    let duplicated: Vec<&Row> = frame
        .rows()
        .iter()
        .filter(|row| groups.get(&group_key(row, &columns)).is_some_and(|count| *count > 1))
        .collect();
    if duplicated.is_empty() {
        return 0;
    }
    let count = duplicated.len();
    warn!(
        dataset = %frame.name(),
        rows = count,
        subset = ?columns,
        "duplicate rows detected"
    );
    let sample: Vec<RowSnapshot> = duplicated
        .iter()
        .take(SAMPLE_LIMIT)
        .map(|row| Frame::snapshot_columns(row, &columns))
        .collect();
    ledger.record(
        RemediationEvent::new(
            frame.name(),
            IssueType::DuplicateRowsDetected,
            format!("{count} row(s) share a key over {}", columns.join(", ")),
        )
        .with_affected(count)
        .with_before(sample)
        .with_detail("rows", count)
        .with_detail("subset_columns", columns),
    );
    count
}
