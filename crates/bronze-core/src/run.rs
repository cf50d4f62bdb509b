//! Run-scoped mutable state.

use bronze_model::{IssueLedger, ReferenceCache};

/// State shared by every dataset of one ingestion run.
///
/// Reference snapshots and the issue ledger live here instead of in
/// process globals, so a new run never sees state left by a previous one.
#[derive(Debug, Default)]
pub struct RunContext {
    pub run_id: String,
    /// Snapshots of datasets validated earlier in this run.
    pub cache: ReferenceCache,
    /// Events not yet attributed to a validation summary.
    pub ledger: IssueLedger,
}

impl RunContext {
    pub fn new_run(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            cache: ReferenceCache::new(),
            ledger: IssueLedger::new(),
        }
    }

    /// Captures the state a failed dataset load must return to.
    pub fn checkpoint(&self) -> RunCheckpoint {
        RunCheckpoint {
            cache: self.cache.clone(),
            ledger_len: self.ledger.len(),
        }
    }

    /// Undoes the run state recorded since `checkpoint` by a dataset whose
    /// transaction was rolled back.
    ///
    /// Reference rows added for other datasets (placeholder parents) are
    /// removed along with their events; events of `dataset` itself are kept
    /// for its failed summary. Returns the number of events dropped.
    pub fn restore(&mut self, checkpoint: RunCheckpoint, dataset: &str) -> usize {
        self.cache = checkpoint.cache;
        self.ledger.discard_since(checkpoint.ledger_len, dataset)
    }

    /// Clears the reference cache and the ledger.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.ledger.clear();
    }
}

/// Run state taken before a dataset transaction starts.
#[derive(Debug)]
pub struct RunCheckpoint {
    cache: ReferenceCache,
    ledger_len: usize,
}
