//! Application configuration, stored as TOML.
//!
//! Every key is optional; missing keys take the defaults below.
//!
//! ```toml
//! [dataset]
//! delay_day = 1
//! use_multi_index = true
//!
//! [fetch]
//! data_dir = "data"
//! start_date = "2019-07-01"
//! end_date = "2021-07-01"
//! mode = "end_date"
//! index = "sz50"
//! ```

use crate::data::{default_fields, DumpMode, IndexKind};
use crate::dataset::DataSetConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dataset: DataSetConfig,
    pub fetch: FetchConfig,
}

/// Download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Where per-symbol files are written.
    pub data_dir: PathBuf,
    /// Where listings are read from; defaults to `data_dir`.
    pub listing_dir: Option<PathBuf>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub mode: DumpMode,
    pub fields: Vec<String>,
    pub index: IndexKind,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            listing_dir: None,
            start_date: NaiveDate::from_ymd_opt(2019, 7, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2021, 7, 1).unwrap_or_default(),
            mode: DumpMode::default(),
            fields: default_fields(),
            index: IndexKind::default(),
        }
    }
}

impl FetchConfig {
    pub fn listing_dir(&self) -> &Path {
        self.listing_dir.as_deref().unwrap_or(&self.data_dir)
    }
}

impl AppConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset.delay_day == 0 {
            return Err(ConfigError::Invalid("dataset.delay_day must be at least 1".into()));
        }
        if self.fetch.start_date > self.fetch.end_date {
            return Err(ConfigError::Invalid(format!(
                "fetch.start_date {} is after fetch.end_date {}",
                self.fetch.start_date, self.fetch.end_date
            )));
        }
        if self.fetch.fields.is_empty() {
            return Err(ConfigError::Invalid("fetch.fields must not be empty".into()));
        }
        Ok(())
    }
}
