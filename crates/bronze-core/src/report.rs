//! Run-level outcome records.

use std::path::PathBuf;

use serde::Serialize;

use bronze_model::ErrorKind;
use bronze_validate::{ValidationStatus, ValidationSummary};
use bronze_warehouse::RunStatus;

/// Condensed result of one dataset load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetOutcome {
    pub dataset: String,
    pub table: Option<String>,
    pub status: ValidationStatus,
    pub rows: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Remediation events attributed to the dataset.
    pub events: usize,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
}

impl DatasetOutcome {
    pub fn from_summary(summary: &ValidationSummary) -> Self {
        let upsert = summary.upsert.unwrap_or_default();
        Self {
            dataset: summary.dataset.clone(),
            table: summary.table.clone(),
            status: summary.status,
            rows: summary.row_count,
            inserted: upsert.inserted,
            updated: upsert.updated,
            events: summary.issues.len(),
            error_kind: summary.error_kind,
            error: summary.error.clone(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Passed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub datasets: Vec<DatasetOutcome>,
    pub summaries: Vec<ValidationSummary>,
    /// Validation summary files written for this run.
    pub summary_paths: Vec<PathBuf>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>, summaries: Vec<ValidationSummary>) -> Self {
        let datasets: Vec<DatasetOutcome> = summaries.iter().map(DatasetOutcome::from_summary).collect();
        Self {
            run_id: run_id.into(),
            status: run_status(&datasets),
            datasets,
            summaries,
            summary_paths: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn failed_count(&self) -> usize {
        self.datasets.iter().filter(|outcome| !outcome.passed()).count()
    }

    pub fn outcome(&self, dataset: &str) -> Option<&DatasetOutcome> {
        self.datasets.iter().find(|outcome| outcome.dataset == dataset)
    }
}

/// Every dataset passed: succeeded; none passed: failed; otherwise partial.
pub fn run_status(datasets: &[DatasetOutcome]) -> RunStatus {
    let failed = datasets.iter().filter(|outcome| !outcome.passed()).count();
    if failed == 0 {
        RunStatus::Succeeded
    } else if failed == datasets.len() {
        RunStatus::Failed
    } else {
        RunStatus::Partial
    }
}
