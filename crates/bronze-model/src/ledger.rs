//! Run-scoped remediation event ledger.

use crate::event::{IssueType, RemediationEvent};

/// Append-only list of remediation events for one run.
///
/// Events are drained per dataset when that dataset's summary is finalized,
/// so each event is reported exactly once.
#[derive(Debug, Default)]
pub struct IssueLedger {
    events: Vec<RemediationEvent>,
}

impl IssueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: RemediationEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[RemediationEvent] {
        &self.events
    }

    pub fn for_dataset<'a>(&'a self, dataset: &'a str) -> impl Iterator<Item = &'a RemediationEvent> + 'a {
        self.events.iter().filter(move |event| event.dataset == dataset)
    }

    pub fn count(&self, dataset: &str, issue_type: IssueType) -> usize {
        self.for_dataset(dataset)
            .filter(|event| event.issue_type == issue_type)
            .count()
    }

    /// Removes and returns every event recorded for `dataset`, in order.
    pub fn drain_dataset(&mut self, dataset: &str) -> Vec<RemediationEvent> {
        let (drained, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|event| event.dataset == dataset);
        self.events = kept;
        drained
    }

    /// Drops events recorded at or after position `mark` unless they belong
    /// to `keep`, returning how many were dropped.
    pub fn discard_since(&mut self, mark: usize, keep: &str) -> usize {
        if mark >= self.events.len() {
            return 0;
        }
        let before = self.events.len();
        let tail = self.events.split_off(mark);
        self.events
            .extend(tail.into_iter().filter(|event| event.dataset == keep));
        before - self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
