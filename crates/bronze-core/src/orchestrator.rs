//! Per-dataset load driver.
//!
//! Each dataset is loaded inside its own transaction:
//!
//! 1. reflect the target table
//! 2. remediate (normalize, dataset rule, deduplicate)
//! 3. stamp run metadata and coerce values to the target types
//! 4. validate the schema; a mismatch fails before anything is written
//! 5. check integrity against the run's reference snapshots
//! 6. upsert and commit
//! 7. register the dataset's own reference snapshot
//!
//! A failed dataset is rolled back and recorded, and the run state returns
//! to where it was before the dataset started, so placeholder parents and
//! snapshots of unwritten rows never reach later datasets. Later datasets
//! can still be loaded. Summaries are finalized when the run finishes so that events
//! recorded against an earlier dataset (placeholder parents) still reach
//! its summary.

use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use bronze_ingest::coerce_frame;
use bronze_model::{
    Frame, LoadConfig, LoadError, ReferenceSnapshot, Result, UpsertOutcome, Value, WarehouseError,
};
use bronze_remediate::{RemediationContext, RuleRegistry, default_registry, remediate_with};
use bronze_validate::{
    SummaryError, ValidationSummary, drop_extra_columns, run_integrity, validate_schema,
    write_summary,
};
use bronze_warehouse::{RunRecord, RunStatus, Warehouse, inspect_target, upsert_frame};

use crate::report::RunReport;
use crate::run::RunContext;

pub const RUN_ID_COLUMN: &str = "ingest_run_id";
pub const INGESTED_AT_COLUMN: &str = "ingested_at";

/// Run-level failures outside any single dataset.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to record ingestion run {run_id}")]
    RunRegistry {
        run_id: String,
        #[source]
        source: WarehouseError,
    },
    #[error(transparent)]
    Summary(#[from] SummaryError),
}

pub struct LoadOrchestrator<W: Warehouse> {
    warehouse: W,
    config: LoadConfig,
    registry: &'static RuleRegistry,
    run: RunContext,
    report_dir: Option<PathBuf>,
    summaries: Vec<ValidationSummary>,
    registered: bool,
}

impl<W: Warehouse> LoadOrchestrator<W> {
    pub fn new(warehouse: W, config: LoadConfig, run_id: impl Into<String>) -> Self {
        Self {
            warehouse,
            config,
            registry: default_registry(),
            run: RunContext::new_run(run_id),
            report_dir: None,
            summaries: Vec::new(),
            registered: false,
        }
    }

    /// Writes one JSON validation summary per dataset into `dir` on finish.
    #[must_use]
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: &'static RuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    pub fn run(&self) -> &RunContext {
        &self.run
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub fn warehouse_mut(&mut self) -> &mut W {
        &mut self.warehouse
    }

    pub fn into_warehouse(self) -> W {
        self.warehouse
    }

    /// Summaries of the datasets loaded so far in this run.
    pub fn summaries(&self) -> &[ValidationSummary] {
        &self.summaries
    }

    /// Records the run start in the configured run table, if any.
    pub fn start(&mut self, record: &RunRecord) -> std::result::Result<(), RunError> {
        let Some(table) = self.config.run_table_ref() else {
            return Ok(());
        };
        self.warehouse
            .register_run(&table, record)
            .map_err(|source| RunError::RunRegistry {
                run_id: record.run_id.clone(),
                source,
            })?;
        self.registered = true;
        info!(run_id = %record.run_id, table = %table, "ingestion run registered");
        Ok(())
    }

    /// Loads one dataset in its own transaction.
    ///
    /// The dataset's summary is kept whether or not the load succeeds.
    pub fn load_dataset(&mut self, frame: Frame) -> Result<UpsertOutcome> {
        let dataset = frame.name().to_string();
        let span = info_span!("dataset", dataset = %dataset, run_id = %self.run.run_id);
        let _guard = span.enter();
        info!(rows = frame.height(), "loading dataset");

        let mut summary = ValidationSummary::new(&dataset).with_run_id(self.run.run_id.as_str());
        let checkpoint = self.run.checkpoint();
        let result = self
            .warehouse
            .begin()
            .map_err(|source| LoadError::warehouse(&dataset, source))
            .and_then(|()| self.load_in_transaction(frame, &mut summary))
            .and_then(|(outcome, snapshot)| {
                self.commit(&dataset, &summary)
                    .map(|()| (outcome, snapshot))
            });

        let result = match result {
            Ok((outcome, snapshot)) => {
                if let Some(snapshot) = snapshot {
                    debug!(rows = snapshot.len(), "reference snapshot registered");
                    self.run.cache.register(snapshot);
                }
                info!(
                    inserted = outcome.inserted_count(),
                    updated = outcome.updated_count(),
                    "dataset loaded"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback) = self.warehouse.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                let discarded = self.run.restore(checkpoint, &dataset);
                if discarded > 0 {
                    debug!(events = discarded, "discarded events of rolled back writes");
                }
                warn!(error = %err, kind = %err.kind().as_str(), "dataset load failed");
                summary.record_error(&err);
                Err(err)
            }
        };
        summary.attach_events(self.run.ledger.drain_dataset(&dataset));
        self.summaries.push(summary);
        result
    }

    /// Records a dataset that failed before it reached [`Self::load_dataset`],
    /// such as an unreadable source file.
    pub fn record_failure(&mut self, dataset: &str, error: &LoadError) {
        warn!(dataset = %dataset, error = %error, kind = %error.kind().as_str(), "dataset skipped");
        let mut summary = ValidationSummary::new(dataset).with_run_id(self.run.run_id.as_str());
        summary.record_error(error);
        self.summaries.push(summary);
    }

    fn commit(&mut self, dataset: &str, summary: &ValidationSummary) -> Result<()> {
        self.warehouse
            .commit()
            .map_err(|source| LoadError::PersistenceFailure {
                dataset: dataset.to_string(),
                table: summary.table.clone().unwrap_or_default(),
                source,
            })
    }

    /// Returns the upsert outcome and the dataset's reference snapshot,
    /// which only becomes visible to later datasets once committed.
    fn load_in_transaction(
        &mut self,
        frame: Frame,
        summary: &mut ValidationSummary,
    ) -> Result<(UpsertOutcome, Option<ReferenceSnapshot>)> {
        let dataset = frame.name().to_string();
        let table = self.config.table_ref(&dataset);
        let dataset_config = self.config.dataset(&dataset);
        let target = inspect_target(&mut self.warehouse, &table, dataset_config)
            .map_err(|source| LoadError::warehouse(&dataset, source))?;
        summary.observe_target(&target);

        let mut frame = {
            let mut ctx = RemediationContext::new(
                &dataset,
                &self.run.run_id,
                &self.config,
                &mut self.warehouse,
                &mut self.run.cache,
                &mut self.run.ledger,
            );
            remediate_with(self.registry, frame, &mut ctx)?
        };

        stamp_run_metadata(&mut frame, &self.run.run_id, |column| target.has_column(column));
        coerce_frame(
            &mut frame,
            &target,
            self.config.coercion_context_for(&dataset),
            &mut self.run.ledger,
        );
        summary.observe_frame(&frame);

        let schema = validate_schema(&frame, &target);
        summary.record_schema(&schema);
        if !schema.is_valid {
            return Err(LoadError::SchemaMismatch {
                dataset,
                table: table.to_string(),
                diff: Box::new(schema),
            });
        }
        drop_extra_columns(&mut frame, &schema);

        let checks = dataset_config.map_or(&[][..], |config| config.checks.as_slice());
        let report = run_integrity(
            &frame,
            &target,
            self.config.foreign_keys_for(&dataset),
            &self.run.cache,
            self.config.fk_context_for(&dataset),
            checks,
        );
        summary.record_integrity(&report);
        if !report.passed() {
            return Err(LoadError::IntegrityViolation {
                dataset,
                failures: report.failure_lines(),
                report: Box::new(report),
            });
        }

        let reference_columns = self.config.reference_columns_for(&dataset);
        let snapshot = if reference_columns.is_empty() {
            None
        } else {
            ReferenceSnapshot::from_frame(&frame, reference_columns)
        };

        let outcome = upsert_frame(&mut self.warehouse, &target, &frame, &target.unique_columns).map_err(
            |source| LoadError::PersistenceFailure {
                dataset: dataset.clone(),
                table: table.to_string(),
                source,
            },
        )?;
        summary.record_upsert(&outcome);
        Ok((outcome, snapshot))
    }

    /// Attributes late events, finalizes the run record, writes the
    /// summaries and resets the run state.
    ///
    /// The run state is reset even when finalizing or writing fails.
    pub fn finish(&mut self) -> std::result::Result<RunReport, RunError> {
        for event in std::mem::take(&mut self.run.ledger).events() {
            match self.summaries.iter_mut().find(|summary| summary.dataset == event.dataset) {
                Some(summary) => summary.attach_events(vec![event.clone()]),
                None => debug!(dataset = %event.dataset, issue = %event.issue_type, "event without a loaded dataset"),
            }
        }
        let mut report = RunReport::new(self.run.run_id.clone(), std::mem::take(&mut self.summaries));
        let outcome = self.finalize(&mut report);
        self.run.reset();
        self.registered = false;
        outcome.map(|()| report)
    }

    fn finalize(&mut self, report: &mut RunReport) -> std::result::Result<(), RunError> {
        if self.registered
            && let Some(table) = self.config.run_table_ref()
        {
            let notes = (report.status != RunStatus::Succeeded)
                .then(|| format!("{} dataset(s) failed", report.failed_count()));
            self.warehouse
                .finalize_run(&table, &report.run_id, report.status, notes.as_deref())
                .map_err(|source| RunError::RunRegistry {
                    run_id: report.run_id.clone(),
                    source,
                })?;
        }
        if let Some(dir) = &self.report_dir {
            for summary in &report.summaries {
                report.summary_paths.push(write_summary(dir, summary)?);
            }
        }
        info!(
            run_id = %report.run_id,
            status = %report.status,
            datasets = report.datasets.len(),
            failed = report.failed_count(),
            "run finished"
        );
        Ok(())
    }

    /// Starts a new run on the same connection and configuration.
    pub fn new_run(&mut self, run_id: impl Into<String>) {
        self.run = RunContext::new_run(run_id);
        self.summaries.clear();
        self.registered = false;
    }
}

/// Fills `ingest_run_id` and `ingested_at` for targets that carry them.
fn stamp_run_metadata(frame: &mut Frame, run_id: &str, target_has: impl Fn(&str) -> bool) {
    if target_has(RUN_ID_COLUMN) {
        frame.ensure_column(RUN_ID_COLUMN);
        frame.map_column(RUN_ID_COLUMN, |_| Value::text(run_id));
    }
    if target_has(INGESTED_AT_COLUMN) {
        let now = Value::Timestamp(Utc::now().naive_utc());
        frame.ensure_column(INGESTED_AT_COLUMN);
        frame.map_column(INGESTED_AT_COLUMN, |_| now.clone());
    }
}
