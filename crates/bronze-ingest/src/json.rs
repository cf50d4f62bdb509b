//! JSON record-array extracts.

use std::collections::BTreeMap;
use std::path::Path;

use bronze_model::{Frame, Value};

use crate::error::{IngestError, Result};

/// Builds a frame from `[{"col": value, ...}, ...]`.
///
/// Column order follows first appearance. Nested arrays and objects are
/// kept as their JSON text.
pub fn frame_from_json_records(dataset: &str, records: &serde_json::Value) -> Result<Frame> {
    let serde_json::Value::Array(items) = records else {
        return Err(IngestError::Shape {
            dataset: dataset.to_string(),
            message: "expected a JSON array of records".to_string(),
        });
    };
    let mut frame = Frame::new(dataset);
    for (position, item) in items.iter().enumerate() {
        let serde_json::Value::Object(fields) = item else {
            return Err(IngestError::Shape {
                dataset: dataset.to_string(),
                message: format!("record {position} is not an object"),
            });
        };
        let mut cells = BTreeMap::new();
        for (key, value) in fields {
            frame.ensure_column(key);
            cells.insert(key.clone(), json_to_value(value));
        }
        frame.push_cells(cells);
    }
    Ok(frame)
}

pub fn read_json_dataset(dataset: &str, path: &Path) -> Result<Frame> {
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let records: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| IngestError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    frame_from_json_records(dataset, &records)
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(flag) => Value::Bool(*flag),
        serde_json::Value::Number(number) => number
            .as_i64()
            .map(Value::Int)
            .or_else(|| number.as_f64().map(Value::Float))
            .unwrap_or(Value::Null),
        serde_json::Value::String(text) if text == "NA" => Value::Null,
        serde_json::Value::String(text) => Value::text(text.as_str()),
        other => Value::text(other.to_string()),
    }
}
