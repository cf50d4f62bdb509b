//! Per-dataset validation summaries.
//!
//! A summary is the structured audit record of one dataset load: row checks,
//! null counts, schema and integrity findings, upsert counts and the
//! remediation events drained from the ledger for that dataset.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use bronze_model::{
    ErrorKind, ForeignKeyFinding, Frame, IntegrityReport, LoadError, RemediationEvent,
    RowCheckResult, SqlType, TargetTable, UniqueFinding, UpsertOutcome, ValidationResult,
    ValueKind,
};

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("failed to write validation summary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize validation summary: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub dataset: String,
    pub run_id: Option<String>,
    pub table: Option<String>,
    pub status: ValidationStatus,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub row_count: usize,
    pub total_checks: usize,
    pub failed_checks: usize,
    pub checks: Vec<RowCheckResult>,
    /// Null counts for columns that contain nulls.
    pub missing_values: BTreeMap<String, usize>,
    pub column_kinds: BTreeMap<String, ValueKind>,
    pub db_column_types: BTreeMap<String, SqlType>,
    pub schema: Option<ValidationResult>,
    pub unique_constraint: Option<UniqueFinding>,
    pub foreign_keys: Vec<ForeignKeyFinding>,
    pub upsert: Option<UpsertCounts>,
    pub notes: Vec<String>,
    pub issues: Vec<RemediationEvent>,
    pub generated_at: DateTime<Utc>,
}

impl ValidationSummary {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            run_id: None,
            table: None,
            status: ValidationStatus::Passed,
            error_kind: None,
            error: None,
            row_count: 0,
            total_checks: 0,
            failed_checks: 0,
            checks: Vec::new(),
            missing_values: BTreeMap::new(),
            column_kinds: BTreeMap::new(),
            db_column_types: BTreeMap::new(),
            schema: None,
            unique_constraint: None,
            foreign_keys: Vec::new(),
            upsert: None,
            notes: Vec::new(),
            issues: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Passed
    }

    /// Records row count, null counts and observed kinds of `frame`.
    pub fn observe_frame(&mut self, frame: &Frame) {
        self.row_count = frame.height();
        self.missing_values.clear();
        self.column_kinds.clear();
        for column in frame.columns() {
            let nulls = frame.null_count(column);
            if nulls > 0 {
                self.missing_values.insert(column.clone(), nulls);
            }
            self.column_kinds
                .insert(column.clone(), frame.column_kind(column));
        }
    }

    pub fn observe_target(&mut self, target: &TargetTable) {
        self.table = Some(target.table.to_string());
        self.db_column_types = target
            .columns
            .iter()
            .map(|column| (column.name.clone(), column.sql_type.clone()))
            .collect();
    }

    pub fn record_schema(&mut self, result: &ValidationResult) {
        if !result.extra_columns.is_empty() {
            let extra: Vec<&str> = result.extra_columns.iter().map(String::as_str).collect();
            self.notes.push(format!(
                "Columns not present in the target were dropped: {}",
                extra.join(", ")
            ));
        }
        if !result.is_valid {
            self.status = ValidationStatus::Failed;
        }
        self.schema = Some(result.clone());
    }

    /// Folds an integrity report in, adding notes for null key columns.
    pub fn record_integrity(&mut self, report: &IntegrityReport) {
        self.checks = report.row_checks.clone();
        self.total_checks = self.checks.len();
        self.failed_checks = self.checks.iter().filter(|check| !check.passed).count();
        if self.checks.is_empty() {
            self.notes.push(
                "No dataset-specific row checks defined; uniqueness and foreign-key checks still executed."
                    .to_string(),
            );
        }

        if let Some(unique) = &report.unique {
            let key_nulls: Vec<String> = unique
                .columns
                .iter()
                .filter_map(|column| {
                    self.missing_values
                        .get(column)
                        .map(|count| format!("{column}={count}"))
                })
                .collect();
            if !key_nulls.is_empty() {
                self.notes.push(format!(
                    "Unique key columns containing nulls: {}",
                    key_nulls.join(", ")
                ));
            }
        }
        self.unique_constraint = report.unique.clone();

        for finding in &report.foreign_keys {
            if finding.null_count > 0 {
                self.notes.push(format!(
                    "Foreign key columns {} contain {} null rows.",
                    finding.target_columns.join(", "),
                    finding.null_count
                ));
            }
        }
        self.foreign_keys = report.foreign_keys.clone();

        if !report.passed() {
            self.status = ValidationStatus::Failed;
        }
    }

    pub fn record_upsert(&mut self, outcome: &UpsertOutcome) {
        self.upsert = Some(UpsertCounts {
            inserted: outcome.inserted_count(),
            updated: outcome.updated_count(),
        });
    }

    /// Marks the summary failed with the error's taxonomy tag.
    pub fn record_error(&mut self, err: &LoadError) {
        self.status = ValidationStatus::Failed;
        self.error_kind = Some(err.kind());
        self.error = Some(err.to_string());
    }

    pub fn attach_events(&mut self, events: Vec<RemediationEvent>) {
        self.issues.extend(events);
    }
}

/// Writes `summary` as pretty JSON into `dir`, creating it when needed.
pub fn write_summary(dir: &Path, summary: &ValidationSummary) -> Result<PathBuf, SummaryError> {
    std::fs::create_dir_all(dir).map_err(|source| SummaryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let stamp = summary.generated_at.format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("validation_{}_{stamp}.json", summary.dataset));
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, json).map_err(|source| SummaryError::Io {
        path: path.clone(),
        source,
    })?;
    info!(dataset = %summary.dataset, path = %path.display(), "validation summary written");
    Ok(path)
}
