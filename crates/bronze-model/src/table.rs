//! Warehouse table descriptions.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::value::{DATE_FORMAT, Value, ValueKind};

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parses `schema.table`, falling back to `default_schema` for bare names.
    pub fn parse(qualified: &str, default_schema: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, table)) => Self::new(schema.trim(), table.trim()),
            None => Self::new(default_schema, qualified.trim()),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Column type as reported by the warehouse catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    Text,
    Varchar,
    SmallInt,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Numeric,
    Boolean,
    Date,
    Timestamp,
    TimestampTz,
    Uuid,
    Other(String),
}

impl SqlType {
    /// Maps an `information_schema.columns.data_type` value.
    pub fn from_catalog(data_type: &str) -> Self {
        match data_type.trim().to_lowercase().as_str() {
            "text" => Self::Text,
            "character varying" | "varchar" | "character" | "char" => Self::Varchar,
            "smallint" => Self::SmallInt,
            "integer" | "int" | "int4" => Self::Integer,
            "bigint" | "int8" => Self::BigInt,
            "real" => Self::Real,
            "double precision" | "float8" => Self::DoublePrecision,
            "numeric" | "decimal" => Self::Numeric,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "timestamp" | "timestamp without time zone" => Self::Timestamp,
            "timestamptz" | "timestamp with time zone" => Self::TimestampTz,
            "uuid" => Self::Uuid,
            other => Self::Other(other.to_string()),
        }
    }

    /// Type name usable in a SQL cast.
    pub fn as_sql(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Varchar => "character varying",
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Real => "real",
            Self::DoublePrecision => "double precision",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp without time zone",
            Self::TimestampTz => "timestamp with time zone",
            Self::Uuid => "uuid",
            Self::Other(name) => name,
        }
    }

    /// Expected runtime kind; `None` for types that are not checked.
    pub fn expected_kind(&self) -> Option<ExpectedKind> {
        match self {
            Self::Text | Self::Varchar | Self::Uuid => Some(ExpectedKind::StringLike),
            Self::SmallInt | Self::Integer | Self::BigInt => Some(ExpectedKind::IntegerLike),
            Self::Real | Self::DoublePrecision | Self::Numeric => Some(ExpectedKind::FloatLike),
            Self::Boolean => Some(ExpectedKind::BooleanLike),
            Self::Date | Self::Timestamp | Self::TimestampTz => Some(ExpectedKind::DateTimeLike),
            Self::Other(_) => None,
        }
    }

    /// Parses the text rendering the warehouse returns for this type.
    pub fn value_from_text(&self, text: Option<&str>) -> Value {
        let Some(text) = text else {
            return Value::Null;
        };
        let parsed = match self {
            Self::SmallInt | Self::Integer | Self::BigInt => text.parse::<i64>().ok().map(Value::Int),
            Self::Real | Self::DoublePrecision | Self::Numeric => {
                text.parse::<f64>().ok().map(Value::Float)
            }
            Self::Boolean => match text {
                "t" | "true" => Some(Value::Bool(true)),
                "f" | "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(Value::Date),
            Self::Timestamp | Self::TimestampTz => parse_timestamp_text(text).map(Value::Timestamp),
            _ => None,
        };
        parsed.unwrap_or_else(|| Value::text(text))
    }
}

fn parse_timestamp_text(text: &str) -> Option<NaiveDateTime> {
    // Offsets like `+00` are dropped; timestamps are stored as UTC.
    let without_offset = match text.rfind(['+', '-']) {
        Some(index) if index > 10 => &text[..index],
        _ => text,
    };
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(without_offset, format).ok())
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl Serialize for SqlType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_sql())
    }
}

/// Runtime kind family a SQL type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedKind {
    IntegerLike,
    FloatLike,
    StringLike,
    BooleanLike,
    DateTimeLike,
}

impl ExpectedKind {
    /// Whether a column of `actual` kind satisfies this expectation.
    ///
    /// All-null columns are always accepted. Date columns also accept text
    /// and mixed columns since upstream extracts often lose date typing.
    pub fn accepts(self, actual: ValueKind) -> bool {
        match (self, actual) {
            (_, ValueKind::Null) => true,
            (Self::IntegerLike, ValueKind::Integer) => true,
            (Self::FloatLike, ValueKind::Float | ValueKind::Integer) => true,
            (Self::StringLike, ValueKind::String) => true,
            (Self::BooleanLike, ValueKind::Boolean) => true,
            (
                Self::DateTimeLike,
                ValueKind::Date | ValueKind::Timestamp | ValueKind::String | ValueKind::Mixed,
            ) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntegerLike => "integer-like",
            Self::FloatLike => "float-like",
            Self::StringLike => "string-like",
            Self::BooleanLike => "boolean-like",
            Self::DateTimeLike => "datetime-like",
        }
    }
}

impl fmt::Display for ExpectedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: SqlType,
    pub is_primary_key: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            is_primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }
}

/// Target relation plus its configured uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetTable {
    pub table: TableRef,
    pub columns: Vec<ColumnSpec>,
    pub unique_columns: Vec<String>,
    pub nullable_unique_columns: BTreeSet<String>,
}

impl TargetTable {
    pub fn new(table: TableRef, columns: Vec<ColumnSpec>) -> Self {
        Self {
            table,
            columns,
            unique_columns: Vec::new(),
            nullable_unique_columns: BTreeSet::new(),
        }
    }

    pub fn with_unique_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_nullable_unique_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nullable_unique_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }
}
