//! Owned tabular frame with stable synthetic row ids.
//!
//! Rows keep their [`RowId`] through filtering, renaming and in-place
//! edits. Rows produced by splitting an existing row receive fresh ids from
//! [`Frame::derive_row`], so audit events can always pair an original row
//! with the rows that replaced it.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::value::{Value, ValueKind};

/// Audit snapshot of a row: column name to JSON value, plus `_row_id`.
pub type RowSnapshot = BTreeMap<String, serde_json::Value>;

pub const ROW_ID_FIELD: &str = "_row_id";

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RowId(u64);

impl RowId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: RowId,
    cells: BTreeMap<String, Value>,
}

impl Row {
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Returns the cell value, or `Null` when the row has no such cell.
    pub fn get(&self, column: &str) -> &Value {
        self.cells.get(column).unwrap_or(&NULL)
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.cells.insert(column.to_string(), value.into());
    }

    pub fn take(&mut self, column: &str) -> Value {
        self.cells.remove(column).unwrap_or_default()
    }

    pub fn is_null(&self, column: &str) -> bool {
        self.get(column).is_null()
    }

    /// Canonical key for `columns`; `None` when any column is null.
    pub fn key(&self, columns: &[String]) -> Option<Vec<String>> {
        columns
            .iter()
            .map(|column| self.get(column).key_text())
            .collect()
    }

    /// Canonical key where null cells are kept as `None`.
    pub fn key_with_nulls(&self, columns: &[String]) -> Vec<Option<String>> {
        columns
            .iter()
            .map(|column| self.get(column).key_text())
            .collect()
    }

    pub fn values(&self, columns: &[String]) -> Vec<Value> {
        columns
            .iter()
            .map(|column| self.get(column).clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Frame {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    next_id: u64,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builds a frame from column names and positional row values.
    ///
    /// Short rows are padded with nulls; surplus values are ignored.
    pub fn from_rows<C, R>(name: impl Into<String>, columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<Value>>,
    {
        let mut frame = Self::new(name);
        frame.columns = columns.into_iter().map(Into::into).collect();
        for values in rows {
            let cells = frame
                .columns
                .iter()
                .cloned()
                .zip(values.into_iter().chain(std::iter::repeat(Value::Null)))
                .collect();
            frame.push_cells(cells);
        }
        frame
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|existing| existing == column)
    }

    pub fn has_columns(&self, columns: &[String]) -> bool {
        columns.iter().all(|column| self.has_column(column))
    }

    /// Returns the subset of `columns` present in the frame, in the given order.
    pub fn present_columns(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .filter(|column| self.has_column(column))
            .cloned()
            .collect()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Appends a row; columns not seen before are added to the frame.
    pub fn push_cells(&mut self, cells: BTreeMap<String, Value>) -> RowId {
        for column in cells.keys() {
            self.ensure_column(column);
        }
        let id = self.allocate_id();
        self.rows.push(Row { id, cells });
        id
    }

    /// Clones `template` under a fresh row id without inserting it.
    pub fn derive_row(&mut self, template: &Row) -> Row {
        Row {
            id: self.allocate_id(),
            cells: template.cells.clone(),
        }
    }

    /// Replaces the row set; used after a row has been split in place.
    pub fn replace_rows(&mut self, rows: Vec<Row>) {
        for row in &rows {
            for column in row.cells.keys() {
                if !self.has_column(column) {
                    self.columns.push(column.clone());
                }
            }
        }
        self.rows = rows;
    }

    pub fn take_rows(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }

    pub fn ensure_column(&mut self, column: &str) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }

    /// Adds `column` filled with `value` unless it already exists.
    pub fn add_column(&mut self, column: &str, value: &Value) -> bool {
        if self.has_column(column) {
            return false;
        }
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.cells.insert(column.to_string(), value.clone());
        }
        true
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if from == to || !self.has_column(from) {
            return false;
        }
        self.drop_column(to);
        for name in &mut self.columns {
            if name == from {
                *name = to.to_string();
            }
        }
        for row in &mut self.rows {
            if let Some(value) = row.cells.remove(from) {
                row.cells.insert(to.to_string(), value);
            }
        }
        true
    }

    pub fn drop_column(&mut self, column: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|existing| existing != column);
        if self.columns.len() == before {
            return false;
        }
        for row in &mut self.rows {
            row.cells.remove(column);
        }
        true
    }

    /// Renames every column through `rename`; later columns win on collision.
    pub fn rename_columns_with(&mut self, rename: impl Fn(&str) -> String) {
        let mapping: Vec<(String, String)> = self
            .columns
            .iter()
            .map(|column| (column.clone(), rename(column)))
            .collect();
        let mut columns = Vec::with_capacity(mapping.len());
        for (_, renamed) in &mapping {
            if !columns.contains(renamed) {
                columns.push(renamed.clone());
            }
        }
        for row in &mut self.rows {
            let mut cells = BTreeMap::new();
            for (original, renamed) in &mapping {
                if let Some(value) = row.cells.remove(original) {
                    cells.insert(renamed.clone(), value);
                }
            }
            row.cells = cells;
        }
        self.columns = columns;
    }

    /// Keeps rows matching `keep` and returns the removed rows in order.
    pub fn retain(&mut self, mut keep: impl FnMut(&Row) -> bool) -> Vec<Row> {
        let (kept, removed): (Vec<Row>, Vec<Row>) =
            self.take_rows().into_iter().partition(|row| keep(row));
        self.rows = kept;
        removed
    }

    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |row| row.get(column))
    }

    pub fn column_kind(&self, column: &str) -> ValueKind {
        ValueKind::infer(self.column_values(column))
    }

    pub fn null_count(&self, column: &str) -> usize {
        self.column_values(column)
            .filter(|value| value.is_null())
            .count()
    }

    /// Maps every cell of `column` through `map`.
    pub fn map_column(&mut self, column: &str, mut map: impl FnMut(&Value) -> Value) {
        if !self.has_column(column) {
            return;
        }
        for row in &mut self.rows {
            let mapped = map(row.get(column));
            row.cells.insert(column.to_string(), mapped);
        }
    }

    pub fn snapshot(&self, row: &Row) -> RowSnapshot {
        let mut snapshot: RowSnapshot = self
            .columns
            .iter()
            .map(|column| (column.clone(), row.get(column).to_json()))
            .collect();
        snapshot.insert(ROW_ID_FIELD.to_string(), serde_json::Value::from(row.id.0));
        snapshot
    }

    pub fn snapshot_columns(row: &Row, columns: &[String]) -> RowSnapshot {
        columns
            .iter()
            .map(|column| (column.clone(), row.get(column).to_json()))
            .collect()
    }

    /// Snapshots at most `limit` rows.
    pub fn snapshots<'a>(&self, rows: impl IntoIterator<Item = &'a Row>, limit: usize) -> Vec<RowSnapshot> {
        rows.into_iter()
            .take(limit)
            .map(|row| self.snapshot(row))
            .collect()
    }

    fn allocate_id(&mut self) -> RowId {
        let id = RowId(self.next_id);
        self.next_id += 1;
        id
    }
}
