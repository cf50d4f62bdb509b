//! Shared data model for the bronze-layer loader.
//!
//! Everything that crosses a crate boundary lives here: the owned [`Frame`]
//! with stable row ids, warehouse table descriptions, validation and
//! integrity findings, remediation events and the run-scoped
//! [`IssueLedger`] and [`ReferenceCache`].

pub mod config;
pub mod error;
pub mod event;
pub mod finding;
pub mod frame;
pub mod ledger;
pub mod outcome;
pub mod reference;
pub mod table;
pub mod validation;
pub mod value;

pub use config::{
    DatasetConfig, FixupRule, ForeignKeyRule, IdentityPolicy, LoadConfig, STUB_SOURCE_DATASET,
};
pub use error::{ConfigError, ErrorKind, LoadError, Result, WarehouseError};
pub use event::{EVENT_SAMPLE_LIMIT, EventCounts, IssueType, RemediationEvent};
pub use finding::{
    FindingStatus, ForeignKeyFinding, IntegrityReport, RowCheckResult, SAMPLE_LIMIT,
    UniqueFinding,
};
pub use frame::{Frame, Row, RowId, RowSnapshot};
pub use ledger::IssueLedger;
pub use outcome::UpsertOutcome;
pub use reference::{ReferenceCache, ReferenceSnapshot};
pub use table::{ColumnSpec, ExpectedKind, SqlType, TableRef, TargetTable};
pub use validation::{TypeMismatch, ValidationResult};
pub use value::{Value, ValueKind, format_numeric};
