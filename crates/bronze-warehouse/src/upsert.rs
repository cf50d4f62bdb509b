//! Conflict-aware bulk upserts.
//!
//! A frame is turned into one or more [`UpsertBatch`]es. Each batch renders
//! to a single multi-row `INSERT ... ON CONFLICT` statement whose `RETURNING`
//! clause yields the conflict key of every affected row together with
//! `xmax = 0`, which is true only for freshly inserted row versions. That
//! lets the store classify inserts and updates without a read-before-write.

use std::collections::HashSet;

use tracing::{debug, info};

use bronze_model::value::{DATE_FORMAT, TIMESTAMP_FORMAT};
use bronze_model::{
    ColumnSpec, Frame, SqlType, TableRef, TargetTable, UpsertOutcome, Value, WarehouseError,
};

use crate::{Result, Warehouse};

/// PostgreSQL's limit on bind parameters per statement.
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Rows destined for one upsert statement.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertBatch {
    pub table: TableRef,
    pub columns: Vec<ColumnSpec>,
    pub conflict_columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl UpsertBatch {
    pub fn sql(&self) -> String {
        render_upsert_sql(
            &self.table,
            &self.columns,
            &self.conflict_columns,
            self.rows.len(),
        )
    }

    /// Row-major bind parameters in their text form.
    pub fn parameters(&self) -> Vec<Option<String>> {
        self.rows.iter().flatten().map(sql_text).collect()
    }

    /// Positions of the conflict columns within [`UpsertBatch::columns`].
    pub fn key_positions(&self) -> Vec<usize> {
        self.conflict_columns
            .iter()
            .filter_map(|key| self.columns.iter().position(|column| &column.name == key))
            .collect()
    }

    pub fn key_specs(&self) -> Vec<&ColumnSpec> {
        self.key_positions()
            .into_iter()
            .map(|position| &self.columns[position])
            .collect()
    }

    /// Splits the batch so no statement exceeds `max_parameters` binds.
    pub fn pages(&self, max_parameters: usize) -> Vec<UpsertBatch> {
        let per_row = self.columns.len().max(1);
        let rows_per_page = (max_parameters / per_row).max(1);
        self.rows
            .chunks(rows_per_page)
            .map(|chunk| UpsertBatch {
                table: self.table.clone(),
                columns: self.columns.clone(),
                conflict_columns: self.conflict_columns.clone(),
                rows: chunk.to_vec(),
            })
            .collect()
    }
}

/// Text form of a value as bound into `$n::text::<type>` placeholders.
pub fn sql_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Int(number) => Some(number.to_string()),
        Value::Float(number) => Some(number.to_string()),
        Value::Text(text) => Some(text.clone()),
        Value::Date(date) => Some(date.format(DATE_FORMAT).to_string()),
        Value::Timestamp(timestamp) => Some(timestamp.format(TIMESTAMP_FORMAT).to_string()),
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn qualified(table: &TableRef) -> String {
    format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.table))
}

pub(crate) fn placeholder(index: usize, sql_type: &SqlType) -> String {
    match sql_type {
        SqlType::Text => format!("${index}::text"),
        other => format!("${index}::text::{}", other.as_sql()),
    }
}

/// Renders the upsert statement for `row_count` rows.
///
/// With conflict columns, non-key columns are overwritten from `EXCLUDED`;
/// when every column is part of the key the statement uses `DO NOTHING`,
/// and conflicting rows are then not returned at all. Without conflict
/// columns the insert is append-only.
pub fn render_upsert_sql(
    table: &TableRef,
    columns: &[ColumnSpec],
    conflict_columns: &[String],
    row_count: usize,
) -> String {
    let column_list: Vec<String> = columns.iter().map(|column| quote_ident(&column.name)).collect();
    let mut sql = format!(
        "INSERT INTO {} ({})\nVALUES ",
        qualified(table),
        column_list.join(", ")
    );
    let width = columns.len();
    for row in 0..row_count {
        if row > 0 {
            sql.push_str(", ");
        }
        let placeholders: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(offset, column)| placeholder(row * width + offset + 1, &column.sql_type))
            .collect();
        sql.push_str(&format!("({})", placeholders.join(", ")));
    }

    if !conflict_columns.is_empty() {
        let keys: Vec<String> = conflict_columns.iter().map(|key| quote_ident(key)).collect();
        let updates: Vec<String> = columns
            .iter()
            .filter(|column| !conflict_columns.contains(&column.name))
            .map(|column| {
                let name = quote_ident(&column.name);
                format!("{name} = EXCLUDED.{name}")
            })
            .collect();
        sql.push_str(&format!("\nON CONFLICT ({}) ", keys.join(", ")));
        if updates.is_empty() {
            sql.push_str("DO NOTHING");
        } else {
            sql.push_str(&format!("DO UPDATE SET {}", updates.join(", ")));
        }
    }

    let mut returning: Vec<String> = conflict_columns
        .iter()
        .map(|key| format!("{}::text", quote_ident(key)))
        .collect();
    returning.push("(xmax = 0) AS inserted".to_string());
    sql.push_str(&format!("\nRETURNING {}", returning.join(", ")));
    sql
}

/// Upserts every row of `frame` into `target`.
///
/// Only frame columns that exist in the target are written. Rows sharing a
/// non-null conflict key are collapsed to the last occurrence first, since a
/// single statement may not touch the same row twice. Key tuples in the
/// outcome are empty for append-only loads.
pub fn upsert_frame<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    target: &TargetTable,
    frame: &Frame,
    conflict_columns: &[String],
) -> Result<UpsertOutcome> {
    let columns: Vec<ColumnSpec> = frame
        .columns()
        .iter()
        .filter_map(|name| target.column(name).cloned())
        .collect();
    if let Some(missing) = conflict_columns
        .iter()
        .find(|key| !columns.iter().any(|column| &&column.name == key))
    {
        return Err(WarehouseError::Rejected(format!(
            "conflict column {missing} is not written to {}",
            target.table
        )));
    }
    if frame.is_empty() || columns.is_empty() {
        return Ok(UpsertOutcome::default());
    }

    let names: Vec<String> = columns.iter().map(|column| column.name.clone()).collect();
    let rows: Vec<Vec<Value>> = frame.rows().iter().map(|row| row.values(&names)).collect();
    let batch = UpsertBatch {
        table: target.table.clone(),
        columns,
        conflict_columns: conflict_columns.to_vec(),
        rows,
    };
    let batch = collapse_conflicting_rows(batch);

    let mut outcome = UpsertOutcome::default();
    let pages = batch.pages(MAX_BIND_PARAMETERS);
    for (page_index, page) in pages.iter().enumerate() {
        debug!(
            table = %page.table,
            page = page_index + 1,
            pages = pages.len(),
            rows = page.rows.len(),
            "executing upsert batch"
        );
        outcome.merge(warehouse.execute_upsert(page)?);
    }
    info!(
        table = %target.table,
        inserted = outcome.inserted_count(),
        updated = outcome.updated_count(),
        "upsert finished"
    );
    Ok(outcome)
}

fn collapse_conflicting_rows(mut batch: UpsertBatch) -> UpsertBatch {
    let positions = batch.key_positions();
    if positions.is_empty() {
        return batch;
    }
    let before = batch.rows.len();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut kept: Vec<Vec<Value>> = Vec::with_capacity(before);
    for row in batch.rows.into_iter().rev() {
        let key: Option<Vec<String>> = positions
            .iter()
            .map(|position| row[*position].key_text())
            .collect();
        if let Some(key) = key
            && !seen.insert(key)
        {
            continue;
        }
        kept.push(row);
    }
    kept.reverse();
    if kept.len() < before {
        debug!(
            table = %batch.table,
            collapsed = before - kept.len(),
            "collapsed rows sharing a conflict key within one batch"
        );
    }
    batch.rows = kept;
    batch
}
