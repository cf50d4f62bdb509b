//! Coercion of frame columns to warehouse column types.
//!
//! Values that cannot be represented in the target type become null. Every
//! column where that happens produces one `value_coercion` event carrying a
//! bounded sample of the affected rows with their context columns.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use bronze_model::frame::ROW_ID_FIELD;
use bronze_model::{
    Frame, IssueLedger, IssueType, RemediationEvent, RowSnapshot, SAMPLE_LIMIT, SqlType,
    TargetTable, Value,
};

const NULL_TOKENS: [&str; 5] = ["", "nan", "na", "n/a", "null"];
const TEXT_NULL_TOKENS: [&str; 3] = ["none", "null", "nan"];
const TRUE_TOKENS: [&str; 7] = ["true", "t", "yes", "y", "1", "1.0", "on"];
const FALSE_TOKENS: [&str; 7] = ["false", "f", "no", "n", "0", "0.0", "off"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Best-effort boolean reading of loosely typed values.
pub fn coerce_boolean_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::Float(number) if *number == 0.0 => Some(false),
        Value::Float(number) if *number == 1.0 => Some(true),
        Value::Text(text) => {
            let lowered = text.trim().to_lowercase();
            if NULL_TOKENS.contains(&lowered.as_str()) || lowered == "none" {
                None
            } else if TRUE_TOKENS.contains(&lowered.as_str()) {
                Some(true)
            } else if FALSE_TOKENS.contains(&lowered.as_str()) {
                Some(false)
            } else {
                match lowered.parse::<f64>() {
                    Ok(number) if number == 1.0 => Some(true),
                    Ok(number) if number == 0.0 => Some(false),
                    _ => None,
                }
            }
        }
        _ => None,
    }
}

/// Converts one value to the representation stored for `sql_type`.
pub fn coerce_value(value: &Value, sql_type: &SqlType) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match sql_type {
        SqlType::Boolean => coerce_boolean_value(value).into(),
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => match value {
            Value::Bool(flag) => Value::Int(i64::from(*flag)),
            Value::Date(_) | Value::Timestamp(_) => Value::Null,
            other => other
                .as_i64()
                .filter(|number| fits_integer(*number, sql_type))
                .into(),
        },
        SqlType::Real | SqlType::DoublePrecision | SqlType::Numeric => match value {
            Value::Bool(flag) => Value::Float(if *flag { 1.0 } else { 0.0 }),
            Value::Date(_) | Value::Timestamp(_) => Value::Null,
            other => other.as_f64().filter(|number| number.is_finite()).into(),
        },
        SqlType::Date => match value {
            Value::Date(date) => Value::Date(*date),
            Value::Timestamp(timestamp) => Value::Date(timestamp.date()),
            Value::Text(text) => parse_date(text.trim()).into(),
            _ => Value::Null,
        },
        SqlType::Timestamp | SqlType::TimestampTz => match value {
            Value::Timestamp(timestamp) => Value::Timestamp(*timestamp),
            Value::Date(date) => date.and_hms_opt(0, 0, 0).into(),
            Value::Text(text) => parse_timestamp(text.trim()).into(),
            _ => Value::Null,
        },
        SqlType::Text | SqlType::Varchar | SqlType::Uuid => clean_text(value),
        SqlType::Other(_) => value.clone(),
    }
}

fn fits_integer(number: i64, sql_type: &SqlType) -> bool {
    match sql_type {
        SqlType::SmallInt => i16::try_from(number).is_ok(),
        SqlType::Integer => i32::try_from(number).is_ok(),
        _ => true,
    }
}

fn clean_text(value: &Value) -> Value {
    let Some(text) = value.key_text() else {
        return Value::Null;
    };
    let lowered = text.to_lowercase();
    if text.is_empty() || TEXT_NULL_TOKENS.contains(&lowered.as_str()) {
        Value::Null
    } else {
        Value::Text(text)
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| parse_timestamp(text).map(|timestamp| timestamp.date()))
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Coerces every frame column that exists in `target`.
///
/// Returns the number of non-null values that became null.
pub fn coerce_frame(
    frame: &mut Frame,
    target: &TargetTable,
    context_columns: &[String],
    ledger: &mut IssueLedger,
) -> usize {
    let dataset = frame.name().to_string();
    let columns = frame.columns().to_vec();
    let mut total = 0;
    for column in &columns {
        let Some(spec) = target.column(column) else {
            continue;
        };
        let mut lost: Vec<(usize, Value)> = Vec::new();
        for (position, row) in frame.rows_mut().iter_mut().enumerate() {
            let original = row.get(column).clone();
            let coerced = coerce_value(&original, &spec.sql_type);
            if coerced.is_null() && !original.is_null() {
                lost.push((position, original));
            }
            row.set(column, coerced);
        }
        if lost.is_empty() {
            continue;
        }
        total += lost.len();
        warn!(
            dataset = %dataset,
            column = %column,
            sql_type = %spec.sql_type,
            rows = lost.len(),
            "values coerced to null"
        );
        let samples: Vec<RowSnapshot> = lost
            .iter()
            .take(SAMPLE_LIMIT)
            .map(|(position, original)| {
                let row = &frame.rows()[*position];
                let mut snapshot = Frame::snapshot_columns(row, context_columns);
                snapshot.insert(column.clone(), original.to_json());
                snapshot.insert(ROW_ID_FIELD.to_string(), serde_json::Value::from(row.id().get()));
                snapshot
            })
            .collect();
        let mut distinct: Vec<String> = lost.iter().map(|(_, value)| value.to_string()).collect();
        distinct.sort();
        distinct.dedup();
        distinct.truncate(SAMPLE_LIMIT);
        ledger.record(
            RemediationEvent::new(
                dataset.as_str(),
                IssueType::ValueCoercion,
                format!(
                    "{} value(s) in {column} could not be represented as {}",
                    lost.len(),
                    spec.sql_type
                ),
            )
            .with_affected(lost.len())
            .with_before(samples)
            .with_detail("column", column.as_str())
            .with_detail("sql_type", spec.sql_type.as_sql())
            .with_detail("sample_values", distinct),
        );
    }
    debug!(dataset = %dataset, coerced = total, "coercion finished");
    total
}
