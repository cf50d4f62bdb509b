//! Load orchestration for the survivoR bronze layer.
//!
//! [`LoadOrchestrator`] drives datasets through remediation, validation and
//! upsert one at a time, in configuration order, sharing a [`RunContext`]
//! so that later datasets can be checked against earlier ones.

pub mod orchestrator;
pub mod report;
pub mod run;

pub use orchestrator::{INGESTED_AT_COLUMN, LoadOrchestrator, RUN_ID_COLUMN, RunError};
pub use report::{DatasetOutcome, RunReport, run_status};
pub use run::{RunCheckpoint, RunContext};
