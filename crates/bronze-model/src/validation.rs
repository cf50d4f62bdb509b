//! Schema comparison result.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::table::{ExpectedKind, SqlType};
use crate::value::ValueKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeMismatch {
    pub sql_type: SqlType,
    pub expected: ExpectedKind,
    pub actual: ValueKind,
}

/// Outcome of comparing a frame against its target table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub missing_columns: BTreeSet<String>,
    pub extra_columns: BTreeSet<String>,
    pub type_mismatches: BTreeMap<String, TypeMismatch>,
    pub resolved_schema: BTreeMap<String, SqlType>,
}

impl ValidationResult {
    pub fn has_drift(&self) -> bool {
        !self.missing_columns.is_empty()
            || !self.extra_columns.is_empty()
            || !self.type_mismatches.is_empty()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing_columns.is_empty() {
            let missing: Vec<&str> = self.missing_columns.iter().map(String::as_str).collect();
            parts.push(format!("missing columns: {}", missing.join(", ")));
        }
        if !self.type_mismatches.is_empty() {
            let mismatches: Vec<String> = self
                .type_mismatches
                .iter()
                .map(|(column, mismatch)| {
                    format!(
                        "{column} (expected {} for {}, found {})",
                        mismatch.expected, mismatch.sql_type, mismatch.actual
                    )
                })
                .collect();
            parts.push(format!("type mismatches: {}", mismatches.join("; ")));
        }
        if !self.extra_columns.is_empty() {
            let extra: Vec<&str> = self.extra_columns.iter().map(String::as_str).collect();
            parts.push(format!("extra columns: {}", extra.join(", ")));
        }
        if parts.is_empty() {
            f.write_str("schema matches")
        } else {
            f.write_str(&parts.join("; "))
        }
    }
}
