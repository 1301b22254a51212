//! Unique `(date, code)` lookup over a dataset frame.

use super::error::DatasetError;
use crate::domain::{CODE_COLUMN, DATE_COLUMN};
use polars::prelude::*;
use std::collections::HashMap;

/// Row position of every `(date, code)` key. Keys are unique.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    rows: HashMap<(String, String), usize>,
}

impl KeyIndex {
    /// Index a frame, failing on a duplicate or empty key.
    pub fn build(df: &DataFrame) -> Result<Self, DatasetError> {
        let dates = string_column(df, DATE_COLUMN)?;
        let codes = string_column(df, CODE_COLUMN)?;

        let mut rows = HashMap::with_capacity(df.height());
        for (row, (date, code)) in dates.str()?.into_iter().zip(codes.str()?).enumerate() {
            let (Some(date), Some(code)) = (date, code) else {
                return Err(DatasetError::NullKey { row });
            };
            if rows.insert((date.to_string(), code.to_string()), row).is_some() {
                return Err(DatasetError::DuplicateKey {
                    date: date.to_string(),
                    code: code.to_string(),
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn get(&self, date: &str, code: &str) -> Option<usize> {
        self.rows.get(&(date.to_string(), code.to_string())).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A key column as strings (dates may have been parsed as a temporal type).
pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Series, DatasetError> {
    Ok(df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?)
}
