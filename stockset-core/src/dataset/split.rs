//! Chronological train / validation / test split.
//!
//! Splitting is by date, not by row: all rows of one date land in the same
//! part and every part only holds dates later than the previous part's.

use super::error::DatasetError;
use super::index::string_column;
use crate::domain::DATE_COLUMN;
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap};

const RATIO_TOLERANCE: f64 = 1e-6;

/// The three parts of a split dataset.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: DataFrame,
    pub validation: DataFrame,
    pub test: DataFrame,
}

fn validate_ratios(ratios: [f64; 3]) -> Result<(), DatasetError> {
    if ratios.iter().any(|r| !r.is_finite() || *r < 0.0) {
        return Err(DatasetError::InvalidRatios(format!(
            "{ratios:?} must be finite and non-negative"
        )));
    }
    let sum: f64 = ratios.iter().sum();
    if (sum - 1.0).abs() > RATIO_TOLERANCE {
        return Err(DatasetError::InvalidRatios(format!(
            "{ratios:?} sum to {sum}, expected 1"
        )));
    }
    Ok(())
}

/// Split `df` by its sorted unique dates.
///
/// The first `floor(n * train)` dates go to train, the next
/// `floor(n * validation)` to validation, the remainder to test.
pub fn split_by_date(df: &DataFrame, ratios: [f64; 3]) -> Result<DatasetSplit, DatasetError> {
    validate_ratios(ratios)?;

    let dates = string_column(df, DATE_COLUMN)?;
    let dates = dates.str()?;
    let unique: BTreeSet<&str> = dates.into_iter().flatten().collect();

    let n = unique.len();
    let train_end = (n as f64 * ratios[0]).floor() as usize;
    let validation_end = train_end + (n as f64 * ratios[1]).floor() as usize;

    // 0 = train, 1 = validation, 2 = test
    let part_of: HashMap<&str, u8> = unique
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            let part = if i < train_end {
                0
            } else if i < validation_end {
                1
            } else {
                2
            };
            (date, part)
        })
        .collect();

    let parts: Vec<u8> = dates
        .into_iter()
        .map(|date| date.and_then(|d| part_of.get(d).copied()).unwrap_or(2))
        .collect();
    let mask = |wanted: u8| {
        let flags: Vec<bool> = parts.iter().map(|p| *p == wanted).collect();
        BooleanChunked::from_slice("mask".into(), &flags)
    };

    Ok(DatasetSplit {
        train: df.filter(&mask(0))?,
        validation: df.filter(&mask(1))?,
        test: df.filter(&mask(2))?,
    })
}
