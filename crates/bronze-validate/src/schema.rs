//! Schema comparison between a frame and its target table.

use tracing::{debug, warn};

use bronze_model::{Frame, TargetTable, TypeMismatch, ValidationResult};

/// Compares `frame` against `target`.
///
/// Target columns absent from the frame are missing unless they belong to
/// the primary key. Frame columns absent from the target are extra; they
/// never make the result invalid on their own.
pub fn validate_schema(frame: &Frame, target: &TargetTable) -> ValidationResult {
    let mut result = ValidationResult::default();
    for column in &target.columns {
        result
            .resolved_schema
            .insert(column.name.clone(), column.sql_type.clone());
        if !frame.has_column(&column.name) {
            if !column.is_primary_key {
                result.missing_columns.insert(column.name.clone());
            }
            continue;
        }
        let Some(expected) = column.sql_type.expected_kind() else {
            continue;
        };
        let actual = frame.column_kind(&column.name);
        if !expected.accepts(actual) {
            result.type_mismatches.insert(
                column.name.clone(),
                TypeMismatch {
                    sql_type: column.sql_type.clone(),
                    expected,
                    actual,
                },
            );
        }
    }
    for column in frame.columns() {
        if !target.has_column(column) {
            result.extra_columns.insert(column.clone());
        }
    }
    result.is_valid = result.missing_columns.is_empty() && result.type_mismatches.is_empty();

    if !result.extra_columns.is_empty() {
        let extra: Vec<&str> = result.extra_columns.iter().map(String::as_str).collect();
        warn!(
            dataset = %frame.name(),
            table = %target.table,
            columns = %extra.join(", "),
            "schema drift: columns not present in target will be dropped"
        );
    }
    debug!(
        dataset = %frame.name(),
        valid = result.is_valid,
        missing = result.missing_columns.len(),
        mismatched = result.type_mismatches.len(),
        "schema validated"
    );
    result
}

/// Removes the columns `result` classified as extra; returns how many.
pub fn drop_extra_columns(frame: &mut Frame, result: &ValidationResult) -> usize {
    result
        .extra_columns
        .iter()
        .filter(|column| frame.drop_column(column))
        .count()
}
