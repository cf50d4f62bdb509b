//! Warehouse boundary for the bronze layer.
//!
//! The [`Warehouse`] trait is the seam between the load pipeline and the
//! relational store. [`PostgresWarehouse`] talks to PostgreSQL through the
//! blocking `postgres` client; [`MemoryWarehouse`] applies the same catalog,
//! upsert and transaction semantics in memory.

pub mod inspect;
pub mod memory;
pub mod pg;
pub mod run;
pub mod upsert;

pub use inspect::inspect_target;
pub use memory::{MemoryWarehouse, StoredRun};
pub use pg::PostgresWarehouse;
pub use run::{RunRecord, RunStatus};
pub use upsert::{MAX_BIND_PARAMETERS, UpsertBatch, render_upsert_sql, sql_text, upsert_frame};

use bronze_model::{ColumnSpec, Frame, TableRef, UpsertOutcome, WarehouseError};

pub type Result<T> = std::result::Result<T, WarehouseError>;

/// Operations the load pipeline needs from a relational store.
///
/// One connection is shared by a whole run. Each dataset is loaded between
/// [`Warehouse::begin`] and [`Warehouse::commit`] (or
/// [`Warehouse::rollback`]); reads made during remediation happen inside
/// the same transaction as that dataset's upsert.
pub trait Warehouse {
    /// Columns of `table` in ordinal order; empty when the table is absent.
    fn describe_table(&mut self, table: &TableRef) -> Result<Vec<ColumnSpec>>;

    /// Reads the given columns of `table`.
    ///
    /// Columns the table lacks are left out of the returned frame. Returns
    /// `None` when the table does not exist.
    fn fetch_rows(&mut self, table: &TableRef, columns: &[String]) -> Result<Option<Frame>>;

    /// Executes one batched upsert statement.
    fn execute_upsert(&mut self, batch: &UpsertBatch) -> Result<UpsertOutcome>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Records the start of an ingestion run in `table`.
    fn register_run(&mut self, table: &TableRef, run: &RunRecord) -> Result<()>;

    /// Marks an ingestion run finished with `status`.
    fn finalize_run(
        &mut self,
        table: &TableRef,
        run_id: &str,
        status: RunStatus,
        notes: Option<&str>,
    ) -> Result<()>;
}
