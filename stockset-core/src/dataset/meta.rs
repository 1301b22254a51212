//! Metadata sidecar written next to a persisted dataset.
//!
//! Layout: `{dest}.meta.json`

use super::error::DatasetError;
use super::Dataset;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Summary of a persisted dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub rows: usize,
    pub symbols: usize,
    pub columns: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub delay_day: usize,
    /// BLAKE3 hash of the dataset file contents.
    pub content_hash: String,
    pub created_at: NaiveDateTime,
}

impl DatasetMeta {
    /// Describe `dataset`, hashing the file it was persisted to.
    pub fn describe(dataset: &Dataset, path: &Path, delay_day: usize) -> Result<Self, DatasetError> {
        let (start_date, end_date) = match dataset.date_range()? {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };
        Ok(Self {
            rows: dataset.height(),
            symbols: dataset.codes()?.len(),
            columns: dataset.columns(),
            start_date,
            end_date,
            delay_day,
            content_hash: hash_file(path)?,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), DatasetError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, DatasetError> {
        if !path.exists() {
            return Err(DatasetError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// `{dest}.meta.json`
pub fn sidecar_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

/// BLAKE3 hex digest of a file.
pub fn hash_file(path: &Path) -> Result<String, DatasetError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}
