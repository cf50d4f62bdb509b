//! Validation of remediated frames before persistence.
//!
//! - [`schema`]: column presence and type compatibility against the target.
//! - [`integrity`]: uniqueness and foreign-key rules over run-scoped
//!   reference snapshots.
//! - [`checks`]: declarative row checks (`missing_count`, `duplicate_count`).
//! - [`summary`]: per-dataset validation summaries written as JSON.

pub mod checks;
pub mod integrity;
pub mod schema;
pub mod summary;

pub use checks::{RowCheck, RowMetric, evaluate_row_checks};
pub use integrity::{check_foreign_key, check_unique, run_integrity};
pub use schema::{drop_extra_columns, validate_schema};
pub use summary::{SummaryError, UpsertCounts, ValidationStatus, ValidationSummary, write_summary};
