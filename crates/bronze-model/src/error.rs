use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::finding::IntegrityReport;
use crate::frame::RowSnapshot;
use crate::validation::ValidationResult;

/// Failures raised by a warehouse backend.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("table {table} not found in the warehouse catalog")]
    TableNotFound { table: String },
    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("statement rejected: {0}")]
    Rejected(String),
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl WarehouseError {
    pub fn query(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Query {
            context: context.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Taxonomy tag attached to every [`LoadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchemaMismatch,
    IntegrityViolation,
    UnresolvedIdentity,
    PersistenceFailure,
    Warehouse,
    Config,
    Ingest,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SchemaMismatch => "schema_mismatch",
            Self::IntegrityViolation => "integrity_violation",
            Self::UnresolvedIdentity => "unresolved_identity",
            Self::PersistenceFailure => "persistence_failure",
            Self::Warehouse => "warehouse",
            Self::Config => "config",
            Self::Ingest => "ingest",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal dataset-load failures.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("schema mismatch for {dataset} against {table}: {diff}")]
    SchemaMismatch {
        dataset: String,
        table: String,
        diff: Box<ValidationResult>,
    },
    #[error("integrity violation in {dataset}: {}", .failures.join("; "))]
    IntegrityViolation {
        dataset: String,
        failures: Vec<String>,
        report: Box<IntegrityReport>,
    },
    #[error("unresolved {column} for {count} row(s) in {dataset}")]
    UnresolvedIdentity {
        dataset: String,
        column: String,
        count: usize,
        sample: Vec<RowSnapshot>,
    },
    #[error("failed to persist {dataset} into {table}")]
    PersistenceFailure {
        dataset: String,
        table: String,
        #[source]
        source: WarehouseError,
    },
    #[error("warehouse access failed while loading {dataset}")]
    Warehouse {
        dataset: String,
        #[source]
        source: WarehouseError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read dataset {dataset}: {message}")]
    Ingest { dataset: String, message: String },
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::IntegrityViolation { .. } => ErrorKind::IntegrityViolation,
            Self::UnresolvedIdentity { .. } => ErrorKind::UnresolvedIdentity,
            Self::PersistenceFailure { .. } => ErrorKind::PersistenceFailure,
            Self::Warehouse { .. } => ErrorKind::Warehouse,
            Self::Config(_) => ErrorKind::Config,
            Self::Ingest { .. } => ErrorKind::Ingest,
        }
    }

    pub fn warehouse(dataset: impl Into<String>, source: WarehouseError) -> Self {
        Self::Warehouse {
            dataset: dataset.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
