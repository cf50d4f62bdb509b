//! Polars `AnyValue` conversion into frame values.

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::*;

use bronze_model::{Frame, Value};

use crate::error::{IngestError, Result};

/// Converts a Polars `AnyValue` into a [`Value`].
///
/// Kinds without a direct counterpart are carried as their text rendering.
pub fn any_to_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int8(v) => Value::Int(i64::from(v)),
        AnyValue::Int16(v) => Value::Int(i64::from(v)),
        AnyValue::Int32(v) => Value::Int(i64::from(v)),
        AnyValue::Int64(v) => Value::Int(v),
        AnyValue::UInt8(v) => Value::Int(i64::from(v)),
        AnyValue::UInt16(v) => Value::Int(i64::from(v)),
        AnyValue::UInt32(v) => Value::Int(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).map_or_else(|_| Value::Float(v as f64), Value::Int),
        AnyValue::Float32(v) => float_value(f64::from(v)),
        AnyValue::Float64(v) => float_value(v),
        AnyValue::String(s) => Value::text(s),
        AnyValue::StringOwned(s) => Value::text(s.as_str()),
        other => Value::text(other.to_string()),
    }
}

fn float_value(value: f64) -> Value {
    if value.is_nan() {
        Value::Null
    } else {
        Value::Float(value)
    }
}

/// Copies a polars frame into an owned [`Frame`] named `dataset`.
pub fn frame_from_polars(dataset: &str, df: &DataFrame) -> Result<Frame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let mut frame = Frame::new(dataset);
    for name in &names {
        frame.ensure_column(name);
    }
    let columns = df.get_columns();
    for idx in 0..df.height() {
        let mut cells = BTreeMap::new();
        for (name, column) in names.iter().zip(columns) {
            cells.insert(name.clone(), any_to_value(column.get(idx)?));
        }
        frame.push_cells(cells);
    }
    Ok(frame)
}

/// Reads a CSV extract; R's `NA` markers become nulls.
pub fn read_csv_dataset(dataset: &str, path: &Path) -> Result<Frame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let mut frame = frame_from_polars(dataset, &df)?;
    let columns = frame.columns().to_vec();
    for column in &columns {
        frame.map_column(column, |value| match value {
            Value::Text(text) if text == "NA" => Value::Null,
            other => other.clone(),
        });
    }
    Ok(frame)
}
