//! Remediation events recorded during a load.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::frame::RowSnapshot;

/// Maximum rows kept in each snapshot list of an event.
pub const EVENT_SAMPLE_LIMIT: usize = 200;

/// Closed set of remediation and anomaly categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    DeduplicatedRows,
    ValueCoercion,
    MultiHolderSplit,
    MultiTargetSplit,
    CastawayIdBackfilled,
    CastawayIdFuzzyBackfill,
    ChallengeIdKnownFix,
    ChallengeIdStageRemediation,
    ChallengeIdUnresolved,
    InvalidTargetDropped,
    DescriptionStubCreated,
    RowsDroppedMissingReference,
    NullIdentityRetained,
    DuplicateRowsDetected,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeduplicatedRows => "deduplicated_rows",
            Self::ValueCoercion => "value_coercion",
            Self::MultiHolderSplit => "multi_holder_split",
            Self::MultiTargetSplit => "multi_target_split",
            Self::CastawayIdBackfilled => "castaway_id_backfilled",
            Self::CastawayIdFuzzyBackfill => "castaway_id_fuzzy_backfill",
            Self::ChallengeIdKnownFix => "challenge_id_known_fix",
            Self::ChallengeIdStageRemediation => "challenge_id_stage_remediation",
            Self::ChallengeIdUnresolved => "challenge_id_unresolved",
            Self::InvalidTargetDropped => "invalid_target_dropped",
            Self::DescriptionStubCreated => "description_stub_created",
            Self::RowsDroppedMissingReference => "rows_dropped_missing_reference",
            Self::NullIdentityRetained => "null_identity_retained",
            Self::DuplicateRowsDetected => "duplicate_rows_detected",
        }
    }

    /// Short human label for report headers.
    pub fn label(self) -> &'static str {
        match self {
            Self::DeduplicatedRows => "Removed duplicate records",
            Self::ValueCoercion => "Values coerced to match schema types",
            Self::MultiHolderSplit => "Split rows with multiple holders",
            Self::MultiTargetSplit => "Split rows with multiple targets",
            Self::CastawayIdBackfilled => "Backfilled castaway ids by name",
            Self::CastawayIdFuzzyBackfill => "Backfilled castaway ids by fuzzy name match",
            Self::ChallengeIdKnownFix => "Corrected challenge ids using known fixups",
            Self::ChallengeIdStageRemediation => "Corrected challenge ids using stage of game",
            Self::ChallengeIdUnresolved => "Challenge ids left unresolved",
            Self::InvalidTargetDropped => "Dropped invalid targets",
            Self::DescriptionStubCreated => "Synthesized missing challenge descriptions",
            Self::RowsDroppedMissingReference => "Removed rows with unknown references",
            Self::NullIdentityRetained => "Rows retain null identity",
            Self::DuplicateRowsDetected => "Duplicate rows detected",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub rows_affected: usize,
    pub rows_before: Option<usize>,
    pub rows_after: Option<usize>,
}

/// One audited remediation or anomaly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationEvent {
    pub dataset: String,
    pub issue_type: IssueType,
    pub recorded_at: DateTime<Utc>,
    pub message: String,
    pub counts: EventCounts,
    pub before_rows: Vec<RowSnapshot>,
    pub after_rows: Vec<RowSnapshot>,
    pub reference_rows: Vec<RowSnapshot>,
    pub details: BTreeMap<String, serde_json::Value>,
}

impl RemediationEvent {
    pub fn new(dataset: impl Into<String>, issue_type: IssueType, message: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            issue_type,
            recorded_at: Utc::now(),
            message: message.into(),
            counts: EventCounts::default(),
            before_rows: Vec::new(),
            after_rows: Vec::new(),
            reference_rows: Vec::new(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_affected(mut self, rows: usize) -> Self {
        self.counts.rows_affected = rows;
        self
    }

    #[must_use]
    pub fn with_row_counts(mut self, before: usize, after: usize) -> Self {
        self.counts.rows_before = Some(before);
        self.counts.rows_after = Some(after);
        self
    }

    #[must_use]
    pub fn with_before(mut self, rows: Vec<RowSnapshot>) -> Self {
        self.before_rows = truncate(rows);
        self
    }

    #[must_use]
    pub fn with_after(mut self, rows: Vec<RowSnapshot>) -> Self {
        self.after_rows = truncate(rows);
        self
    }

    #[must_use]
    pub fn with_reference(mut self, rows: Vec<RowSnapshot>) -> Self {
        self.reference_rows = truncate(rows);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&serde_json::Value> {
        self.details.get(key)
    }
}

fn truncate(mut rows: Vec<RowSnapshot>) -> Vec<RowSnapshot> {
    rows.truncate(EVENT_SAMPLE_LIMIT);
    rows
}
