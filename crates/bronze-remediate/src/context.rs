//! Run-scoped state handed to every remediation rule.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use bronze_model::{
    Frame, IssueLedger, LoadConfig, LoadError, ReferenceCache, ReferenceSnapshot, RemediationEvent,
    Result, Value,
};
use bronze_warehouse::Warehouse;

/// Everything a rule may read or write while remediating one dataset.
///
/// Reference lookups combine rows already stored in the warehouse with the
/// snapshots validated earlier in the current run.
pub struct RemediationContext<'a> {
    pub dataset: &'a str,
    pub run_id: &'a str,
    pub config: &'a LoadConfig,
    pub warehouse: &'a mut dyn Warehouse,
    pub cache: &'a mut ReferenceCache,
    pub ledger: &'a mut IssueLedger,
}

impl<'a> RemediationContext<'a> {
    pub fn new(
        dataset: &'a str,
        run_id: &'a str,
        config: &'a LoadConfig,
        warehouse: &'a mut dyn Warehouse,
        cache: &'a mut ReferenceCache,
        ledger: &'a mut IssueLedger,
    ) -> Self {
        Self {
            dataset,
            run_id,
            config,
            warehouse,
            cache,
            ledger,
        }
    }

    pub fn record(&mut self, event: RemediationEvent) {
        self.ledger.record(event);
    }

    /// Rows of `dataset` projected onto `columns`.
    ///
    /// Returns `None` when neither the warehouse table nor a run snapshot
    /// holds every requested column. Identical tuples appear once.
    pub fn reference_rows(&mut self, dataset: &str, columns: &[String]) -> Result<Option<Frame>> {
        let table = self.config.table_ref(dataset);
        let stored = self
            .warehouse
            .fetch_rows(&table, columns)
            .map_err(|source| LoadError::warehouse(self.dataset, source))?
            .filter(|frame| frame.has_columns(columns));
        let snapshot = self
            .cache
            .get(dataset)
            .filter(|snapshot| snapshot.has_columns(columns))
            .map(ReferenceSnapshot::to_frame);
        if stored.is_none() && snapshot.is_none() {
            debug!(dataset = %self.dataset, reference = %dataset, "reference rows unavailable");
            return Ok(None);
        }

        let mut merged = Frame::new(dataset);
        for column in columns {
            merged.ensure_column(column);
        }
        let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
        for source in stored.iter().chain(snapshot.iter()) {
            for row in source.rows() {
                if !seen.insert(row.key_with_nulls(columns)) {
                    continue;
                }
                let cells: BTreeMap<String, Value> = columns
                    .iter()
                    .map(|column| (column.clone(), row.get(column).clone()))
                    .collect();
                merged.push_cells(cells);
            }
        }
        debug!(
            dataset = %self.dataset,
            reference = %dataset,
            rows = merged.height(),
            "loaded reference rows"
        );
        Ok(Some(merged))
    }

    /// Non-null key tuples of `dataset` over `columns`.
    pub fn reference_keys(
        &mut self,
        dataset: &str,
        columns: &[String],
    ) -> Result<Option<HashSet<Vec<String>>>> {
        Ok(self
            .reference_rows(dataset, columns)?
            .map(|frame| frame.rows().iter().filter_map(|row| row.key(columns)).collect()))
    }
}
