//! Run-scoped reference snapshots of already-loaded datasets.

use std::collections::{HashMap, HashSet};

use crate::frame::Frame;
use crate::value::Value;

/// Deduplicated projection of a validated dataset's key columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSnapshot {
    dataset: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    seen: HashSet<Vec<Option<String>>>,
}

impl ReferenceSnapshot {
    pub fn new(dataset: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            dataset: dataset.into(),
            columns,
            rows: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Projects `frame` onto the available subset of `columns`.
    ///
    /// Returns `None` when none of the columns are present.
    pub fn from_frame(frame: &Frame, columns: &[String]) -> Option<Self> {
        let available = frame.present_columns(columns);
        if available.is_empty() {
            return None;
        }
        let mut snapshot = Self::new(frame.name(), available);
        for row in frame.rows() {
            let values = row.values(&snapshot.columns);
            snapshot.push(values);
        }
        Some(snapshot)
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_columns(&self, columns: &[String]) -> bool {
        columns.iter().all(|column| self.columns.contains(column))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds a row unless an identical tuple is already present.
    pub fn push(&mut self, values: Vec<Value>) -> bool {
        let key: Vec<Option<String>> = values.iter().map(Value::key_text).collect();
        if !self.seen.insert(key) {
            return false;
        }
        self.rows.push(values);
        true
    }

    /// Non-null key tuples over `columns`; `None` if a column is not held.
    pub fn tuple_set(&self, columns: &[String]) -> Option<HashSet<Vec<String>>> {
        let positions = self.positions(columns)?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| {
                    positions
                        .iter()
                        .map(|&index| row[index].key_text())
                        .collect::<Option<Vec<String>>>()
                })
                .collect(),
        )
    }

    /// Rebuilds a frame holding the snapshot rows.
    pub fn to_frame(&self) -> Frame {
        Frame::from_rows(self.dataset.clone(), self.columns.clone(), self.rows.iter().cloned())
    }

    fn positions(&self, columns: &[String]) -> Option<Vec<usize>> {
        columns
            .iter()
            .map(|column| self.columns.iter().position(|held| held == column))
            .collect()
    }
}

/// Reference snapshots keyed by dataset name, reset between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceCache {
    snapshots: HashMap<String, ReferenceSnapshot>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the snapshot for its dataset.
    pub fn register(&mut self, snapshot: ReferenceSnapshot) {
        self.snapshots.insert(snapshot.dataset.clone(), snapshot);
    }

    pub fn get(&self, dataset: &str) -> Option<&ReferenceSnapshot> {
        self.snapshots.get(dataset)
    }

    pub fn get_mut(&mut self, dataset: &str) -> Option<&mut ReferenceSnapshot> {
        self.snapshots.get_mut(dataset)
    }

    pub fn contains(&self, dataset: &str) -> bool {
        self.snapshots.contains_key(dataset)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
