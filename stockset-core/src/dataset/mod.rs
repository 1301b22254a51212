//! Aggregated datasets: per-symbol files in, one date-ordered frame with returns out.
//!
//! `DataSet` is the backend-neutral interface (prepare / load / split);
//! `CsvDataSet` is the CSV-backed implementation.

pub mod error;
pub mod index;
pub mod meta;
pub mod returns;
pub mod schema;
pub mod simple_csv;
pub mod split;

pub use error::DatasetError;
pub use index::KeyIndex;
pub use meta::DatasetMeta;
pub use returns::{compute_returns, grouped_returns_expr, returns_series};
pub use schema::{CanonicalSchema, SchemaDiff};
pub use simple_csv::CsvDataSet;
pub use split::{split_by_date, DatasetSplit};

use crate::domain::{CODE_COLUMN, DATE_COLUMN, RETURNS_COLUMN};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Settings shared by dataset backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetConfig {
    /// Lag, in rows, of the `returns` column. At least 1.
    pub delay_day: usize,
    /// Index the result by `(date, code)`.
    pub use_multi_index: bool,
}

impl Default for DataSetConfig {
    fn default() -> Self {
        Self {
            delay_day: 1,
            use_multi_index: true,
        }
    }
}

/// Capability set of a dataset backend.
pub trait DataSet {
    /// Aggregate every per-symbol file of `source_dir` into `dest`.
    ///
    /// Fails before touching the filesystem when `source_dir` is missing or
    /// `dest` already exists. With `persist == false` the destination file is
    /// removed once the result is in memory.
    fn prepare(
        &mut self,
        source_dir: &Path,
        dest: &Path,
        persist: bool,
    ) -> Result<&Dataset, DatasetError>;

    /// Load a previously persisted dataset.
    fn load(&mut self, path: &Path) -> Result<&Dataset, DatasetError>;

    /// The dataset last prepared or loaded.
    fn data(&self) -> Option<&Dataset>;

    /// Chronological train / validation / test split of the current dataset.
    fn split(&self, ratios: [f64; 3]) -> Result<DatasetSplit, DatasetError> {
        let data = self.data().ok_or(DatasetError::NotLoaded)?;
        split_by_date(data.frame(), ratios)
    }
}

/// Date-ordered frame of all symbols, optionally indexed by `(date, code)`.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    index: Option<KeyIndex>,
}

impl Dataset {
    pub fn new(frame: DataFrame, indexed: bool) -> Result<Self, DatasetError> {
        let index = if indexed {
            Some(KeyIndex::build(&frame)?)
        } else {
            None
        };
        Ok(Self { frame, index })
    }

    /// Same rows in the same order with different columns; the index still holds.
    pub(crate) fn with_frame(&self, frame: DataFrame) -> Self {
        Self {
            frame,
            index: self.index.clone(),
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn columns(&self) -> Vec<String> {
        schema::column_names(&self.frame)
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Row position of `(date, code)`; scans when the dataset is not indexed.
    pub fn position(&self, date: &str, code: &str) -> Option<usize> {
        if let Some(index) = &self.index {
            return index.get(date, code);
        }
        let dates = index::string_column(&self.frame, DATE_COLUMN).ok()?;
        let codes = index::string_column(&self.frame, CODE_COLUMN).ok()?;
        let dates = dates.str().ok()?;
        let codes = codes.str().ok()?;
        let found = dates
            .into_iter()
            .zip(codes)
            .position(|(d, c)| d == Some(date) && c == Some(code));
        found
    }

    /// The single row keyed by `(date, code)`.
    pub fn row(&self, date: &str, code: &str) -> Option<DataFrame> {
        self.position(date, code)
            .map(|i| self.frame.slice(i as i64, 1))
    }

    /// The `returns` value of `(date, code)`.
    pub fn returns_at(&self, date: &str, code: &str) -> Option<f64> {
        let i = self.position(date, code)?;
        let returns = self
            .frame
            .column(RETURNS_COLUMN)
            .ok()?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .ok()?;
        returns.f64().ok()?.get(i)
    }

    /// Distinct instrument codes, sorted.
    pub fn codes(&self) -> Result<BTreeSet<String>, DatasetError> {
        let codes = index::string_column(&self.frame, CODE_COLUMN)?;
        let codes = codes.str()?;
        Ok(codes.into_iter().flatten().map(String::from).collect())
    }

    /// First and last date, or `None` for an empty dataset.
    pub fn date_range(&self) -> Result<Option<(String, String)>, DatasetError> {
        let dates = index::string_column(&self.frame, DATE_COLUMN)?;
        let dates = dates.str()?;
        let mut iter = dates.into_iter().flatten();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let (min, max) = iter.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Ok(Some((min.to_string(), max.to_string())))
    }
}
