//! Dataset loading boundary for the bronze layer.
//!
//! Converts externally loaded datasets (polars frames, CSV and JSON record
//! files) into owned [`bronze_model::Frame`]s, normalizes their column names
//! and coerces frame columns to the warehouse column types before persistence.

pub mod coerce;
pub mod discovery;
pub mod error;
pub mod json;
pub mod normalize;
pub mod polars_utils;

pub use coerce::{coerce_boolean_value, coerce_frame, coerce_value};
pub use discovery::{DatasetFormat, DiscoveredDataset, discover_datasets, list_dataset_files};
pub use error::{IngestError, Result};
pub use json::{frame_from_json_records, read_json_dataset};
pub use normalize::{normalize_column_name, normalize_columns};
pub use polars_utils::{any_to_value, frame_from_polars, read_csv_dataset};
