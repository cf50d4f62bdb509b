//! In-memory warehouse with PostgreSQL-compatible upsert semantics.
//!
//! Values are stored the way the server would store them after the
//! `$n::text::<type>` cast, conflicts match only on non-null keys, and a
//! statement that would touch the same row twice is rejected. Transactions
//! snapshot the whole store on `begin`.

use std::collections::{BTreeMap, HashSet};

use bronze_model::{
    ColumnSpec, ExpectedKind, Frame, TableRef, UpsertOutcome, Value, WarehouseError,
};

use crate::run::{RunRecord, RunStatus};
use crate::upsert::{UpsertBatch, sql_text};
use crate::{Result, Warehouse};

type StoredRow = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<ColumnSpec>,
    conflict_key: Vec<String>,
    rows: Vec<StoredRow>,
}

impl MemoryTable {
    fn spec(&self, column: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|spec| spec.name == column)
    }

    fn key_of(&self, row: &StoredRow, columns: &[String]) -> Option<Vec<String>> {
        columns
            .iter()
            .map(|column| row.get(column).and_then(Value::key_text))
            .collect()
    }

    fn find(&self, columns: &[String], key: &[String]) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| self.key_of(row, columns).as_deref() == Some(key))
    }
}

/// An ingestion run as recorded by [`MemoryWarehouse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRun {
    pub table: TableRef,
    pub record: RunRecord,
    pub status: Option<RunStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct State {
    tables: BTreeMap<TableRef, MemoryTable>,
    runs: Vec<StoredRun>,
}

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    state: State,
    snapshot: Option<State>,
    rejected_tables: HashSet<TableRef>,
    statements: usize,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) a table with a unique constraint on `unique`.
    pub fn create_table(&mut self, table: TableRef, columns: Vec<ColumnSpec>, unique: &[&str]) {
        self.state.tables.insert(
            table,
            MemoryTable {
                columns,
                conflict_key: unique.iter().map(|column| (*column).to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    /// Appends rows directly, bypassing constraint checks.
    pub fn seed_rows(&mut self, table: &TableRef, rows: Vec<Vec<(&str, Value)>>) -> Result<()> {
        let stored = self.table_mut(table)?;
        for row in rows {
            stored.rows.push(
                row.into_iter()
                    .map(|(column, value)| (column.to_string(), value))
                    .collect(),
            );
        }
        Ok(())
    }

    /// Makes every later upsert into `table` fail, for failure-path tests.
    pub fn reject_upserts_into(&mut self, table: TableRef) {
        self.rejected_tables.insert(table);
    }

    pub fn rows(&self, table: &TableRef) -> &[StoredRow] {
        self.state
            .tables
            .get(table)
            .map_or(&[], |stored| stored.rows.as_slice())
    }

    pub fn row_count(&self, table: &TableRef) -> usize {
        self.rows(table).len()
    }

    pub fn runs(&self) -> &[StoredRun] {
        &self.state.runs
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Number of upsert statements executed so far.
    pub fn statements_executed(&self) -> usize {
        self.statements
    }

    fn table_mut(&mut self, table: &TableRef) -> Result<&mut MemoryTable> {
        self.state
            .tables
            .get_mut(table)
            .ok_or_else(|| WarehouseError::TableNotFound {
                table: table.to_string(),
            })
    }
}

fn cast(spec: &ColumnSpec, value: &Value) -> Result<Value> {
    let text = sql_text(value);
    let stored = spec.sql_type.value_from_text(text.as_deref());
    let typed = spec
        .sql_type
        .expected_kind()
        .is_some_and(|kind| kind != ExpectedKind::StringLike);
    if typed && matches!(stored, Value::Text(_)) {
        return Err(WarehouseError::Rejected(format!(
            "invalid input syntax for type {}: \"{}\"",
            spec.sql_type,
            text.unwrap_or_default()
        )));
    }
    Ok(stored)
}

impl Warehouse for MemoryWarehouse {
    fn describe_table(&mut self, table: &TableRef) -> Result<Vec<ColumnSpec>> {
        Ok(self
            .state
            .tables
            .get(table)
            .map(|stored| stored.columns.clone())
            .unwrap_or_default())
    }

    fn fetch_rows(&mut self, table: &TableRef, columns: &[String]) -> Result<Option<Frame>> {
        let Some(stored) = self.state.tables.get(table) else {
            return Ok(None);
        };
        let selected: Vec<String> = columns
            .iter()
            .filter(|column| stored.spec(column).is_some())
            .cloned()
            .collect();
        let mut frame = Frame::new(table.table.clone());
        for column in &selected {
            frame.ensure_column(column);
        }
        for row in &stored.rows {
            frame.push_cells(
                selected
                    .iter()
                    .map(|column| (column.clone(), row.get(column).cloned().unwrap_or_default()))
                    .collect(),
            );
        }
        Ok(Some(frame))
    }

    fn execute_upsert(&mut self, batch: &UpsertBatch) -> Result<UpsertOutcome> {
        self.statements += 1;
        if self.rejected_tables.contains(&batch.table) {
            return Err(WarehouseError::Rejected(format!(
                "upsert into {} rejected",
                batch.table
            )));
        }
        // Work on a copy so a failing statement leaves the table untouched.
        let mut stored = self
            .state
            .tables
            .get(&batch.table)
            .cloned()
            .ok_or_else(|| WarehouseError::TableNotFound {
                table: batch.table.to_string(),
            })?;
        let mut specs = Vec::with_capacity(batch.columns.len());
        for column in &batch.columns {
            let spec = stored.spec(&column.name).cloned().ok_or_else(|| {
                WarehouseError::Rejected(format!(
                    "column {} of relation {} does not exist",
                    column.name, batch.table
                ))
            })?;
            specs.push(spec);
        }
        let conflict = &batch.conflict_columns;
        if !conflict.is_empty() {
            let mut wanted = conflict.clone();
            let mut available = stored.conflict_key.clone();
            wanted.sort();
            available.sort();
            if wanted != available {
                return Err(WarehouseError::Rejected(
                    "there is no unique or exclusion constraint matching the ON CONFLICT specification"
                        .to_string(),
                ));
            }
        }
        let update_columns: Vec<&ColumnSpec> = specs
            .iter()
            .filter(|spec| !conflict.contains(&spec.name))
            .collect();

        let mut outcome = UpsertOutcome::default();
        let mut touched: HashSet<Vec<String>> = HashSet::new();
        for values in &batch.rows {
            let mut row = StoredRow::new();
            for (spec, value) in specs.iter().zip(values) {
                row.insert(spec.name.clone(), cast(spec, value)?);
            }
            let key_values: Vec<Value> = conflict
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or_default())
                .collect();

            if conflict.is_empty() {
                if !stored.conflict_key.is_empty()
                    && let Some(key) = stored.key_of(&row, &stored.conflict_key)
                    && stored.find(&stored.conflict_key, &key).is_some()
                {
                    return Err(WarehouseError::Rejected(format!(
                        "duplicate key value violates unique constraint on {}",
                        batch.table
                    )));
                }
                stored.rows.push(complete(&stored.columns, row));
                outcome.inserted_keys.push(Vec::new());
                continue;
            }

            let Some(key) = stored.key_of(&row, conflict) else {
                stored.rows.push(complete(&stored.columns, row));
                outcome.inserted_keys.push(key_values);
                continue;
            };
            let first_touch = touched.insert(key.clone());
            match stored.find(conflict, &key) {
                Some(_) if update_columns.is_empty() => {}
                Some(_) if !first_touch => {
                    return Err(WarehouseError::Rejected(
                        "ON CONFLICT DO UPDATE command cannot affect row a second time".to_string(),
                    ));
                }
                Some(position) => {
                    let existing = &mut stored.rows[position];
                    for spec in &update_columns {
                        let value = row.get(&spec.name).cloned().unwrap_or_default();
                        existing.insert(spec.name.clone(), value);
                    }
                    outcome.updated_keys.push(key_values);
                }
                None => {
                    stored.rows.push(complete(&stored.columns, row));
                    outcome.inserted_keys.push(key_values);
                }
            }
        }
        self.state.tables.insert(batch.table.clone(), stored);
        Ok(outcome)
    }

    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(WarehouseError::Transaction(
                "a transaction is already open".to_string(),
            ));
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| WarehouseError::Transaction("no open transaction".to_string()))
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.state = snapshot;
        }
        Ok(())
    }

    fn register_run(&mut self, table: &TableRef, run: &RunRecord) -> Result<()> {
        self.state.runs.push(StoredRun {
            table: table.clone(),
            record: run.clone(),
            status: None,
            notes: None,
        });
        Ok(())
    }

    fn finalize_run(
        &mut self,
        table: &TableRef,
        run_id: &str,
        status: RunStatus,
        notes: Option<&str>,
    ) -> Result<()> {
        if let Some(run) = self
            .state
            .runs
            .iter_mut()
            .find(|run| &run.table == table && run.record.run_id == run_id)
        {
            run.status = Some(status);
            if let Some(notes) = notes {
                run.notes = Some(notes.to_string());
            }
        }
        Ok(())
    }
}

fn complete(columns: &[ColumnSpec], mut row: StoredRow) -> StoredRow {
    for column in columns {
        row.entry(column.name.clone()).or_default();
    }
    row
}
