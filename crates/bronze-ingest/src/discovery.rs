//! Dataset file discovery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bronze_model::Frame;

use crate::error::{IngestError, Result};
use crate::json::read_json_dataset;
use crate::polars_utils::read_csv_dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Json,
    Csv,
}

impl DatasetFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if ext.eq_ignore_ascii_case("csv") {
            Some(Self::Csv)
        } else {
            None
        }
    }
}

/// A dataset file matched to a configured dataset name.
#[derive(Debug, Clone)]
pub struct DiscoveredDataset {
    pub name: String,
    pub path: PathBuf,
    pub format: DatasetFormat,
}

impl DiscoveredDataset {
    pub fn read(&self) -> Result<Frame> {
        match self.format {
            DatasetFormat::Json => read_json_dataset(&self.name, &self.path),
            DatasetFormat::Csv => read_csv_dataset(&self.name, &self.path),
        }
    }
}

/// Lists JSON and CSV files in a directory, sorted by filename.
pub fn list_dataset_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = std::fs::read_dir(dir).map_err(|source| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && DatasetFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Matches files in `dir` to `names` (case-insensitive file stem).
///
/// Results follow the order of `names`; JSON wins over CSV when both exist.
/// Names without a file are skipped.
pub fn discover_datasets<'a>(
    dir: &Path,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<DiscoveredDataset>> {
    let mut by_stem: BTreeMap<String, (PathBuf, DatasetFormat)> = BTreeMap::new();
    for path in list_dataset_files(dir)? {
        let Some(format) = DatasetFormat::from_path(&path) else {
            continue;
        };
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let stem = stem.to_lowercase();
        let replace = by_stem
            .get(&stem)
            .is_none_or(|(_, existing)| *existing == DatasetFormat::Csv && format == DatasetFormat::Json);
        if replace {
            by_stem.insert(stem, (path, format));
        }
    }
    Ok(names
        .into_iter()
        .filter_map(|name| {
            by_stem
                .get(&name.to_lowercase())
                .map(|(path, format)| DiscoveredDataset {
                    name: name.to_string(),
                    path: path.clone(),
                    format: *format,
                })
        })
        .collect())
}
