//! Integrity findings: uniqueness, foreign keys and row checks.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::frame::RowSnapshot;

/// Maximum rows captured in any finding sample.
pub const SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueFinding {
    pub columns: Vec<String>,
    pub nullable_columns: Vec<String>,
    pub status: FindingStatus,
    pub message: Option<String>,
    /// Null counts for nullable-exempt columns (informational).
    pub nullable_null_counts: BTreeMap<String, usize>,
    pub null_count: usize,
    pub null_sample: Vec<RowSnapshot>,
    pub duplicate_count: usize,
    pub duplicate_sample: Vec<RowSnapshot>,
}

impl UniqueFinding {
    pub fn new(columns: Vec<String>, nullable_columns: Vec<String>) -> Self {
        Self {
            columns,
            nullable_columns,
            status: FindingStatus::Passed,
            message: None,
            nullable_null_counts: BTreeMap::new(),
            null_count: 0,
            null_sample: Vec::new(),
            duplicate_count: 0,
            duplicate_sample: Vec::new(),
        }
    }

    pub fn failed(&self) -> bool {
        self.status == FindingStatus::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKeyFinding {
    pub target_columns: Vec<String>,
    pub reference_dataset: String,
    pub reference_columns: Vec<String>,
    pub allow_null: bool,
    pub status: FindingStatus,
    pub reason: Option<String>,
    pub null_count: usize,
    pub null_sample: Vec<RowSnapshot>,
    pub unmatched_count: usize,
    pub sample_unmatched_rows: Vec<RowSnapshot>,
}

impl ForeignKeyFinding {
    pub fn failed(&self) -> bool {
        self.status == FindingStatus::Failed
    }
}

/// Result of a declarative row check such as `missing_count(col) = 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowCheckResult {
    pub rule: String,
    pub passed: bool,
    pub expected: usize,
    pub observed: Option<usize>,
    pub message: Option<String>,
}

/// All integrity findings for one dataset load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub unique: Option<UniqueFinding>,
    pub foreign_keys: Vec<ForeignKeyFinding>,
    pub row_checks: Vec<RowCheckResult>,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool {
        !self.unique.as_ref().is_some_and(UniqueFinding::failed)
            && !self.foreign_keys.iter().any(ForeignKeyFinding::failed)
            && self.row_checks.iter().all(|check| check.passed)
    }

    /// One line per failed rule, used in error messages.
    pub fn failure_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(unique) = self.unique.as_ref().filter(|finding| finding.failed()) {
            lines.push(format!(
                "unique({}): {}",
                unique.columns.join(", "),
                unique.message.as_deref().unwrap_or("failed")
            ));
        }
        for finding in self.foreign_keys.iter().filter(|finding| finding.failed()) {
            lines.push(format!(
                "foreign key ({}) -> {}({}): {} unmatched",
                finding.target_columns.join(", "),
                finding.reference_dataset,
                finding.reference_columns.join(", "),
                finding.unmatched_count
            ));
        }
        for check in self.row_checks.iter().filter(|check| !check.passed) {
            let observed = check
                .observed
                .map_or_else(|| "n/a".to_string(), |count| count.to_string());
            lines.push(format!("{}: observed {observed}", check.rule));
        }
        lines
    }
}
