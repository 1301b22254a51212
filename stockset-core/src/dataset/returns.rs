//! Delayed percentage returns.
//!
//! `returns[i] = close[i - lag] / close[i] - 1`, and 0 wherever `i - lag`
//! falls before the start of the series or a price is missing. Over a
//! multi-symbol frame the shift is windowed by `code`, so a return never
//! mixes prices of two instruments.

use crate::domain::{CLOSE_COLUMN, CODE_COLUMN, RETURNS_COLUMN};
use polars::prelude::*;

/// Returns over an ordered close-price series.
pub fn compute_returns(close: &[f64], lag: usize) -> Vec<f64> {
    (0..close.len())
        .map(|i| {
            if i < lag {
                return 0.0;
            }
            let value = close[i - lag] / close[i] - 1.0;
            if value.is_nan() {
                0.0
            } else {
                value
            }
        })
        .collect()
}

/// Returns of a close-price column, as a series named `returns`.
///
/// Nulls are treated as missing prices.
pub fn returns_series(close: &Series, lag: usize) -> PolarsResult<Series> {
    let close = close.cast(&DataType::Float64)?;
    let prices: Vec<f64> = close
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    Ok(Series::new(RETURNS_COLUMN.into(), compute_returns(&prices, lag)))
}

/// Expression computing `returns` per `code` group over a date-ordered frame.
pub fn grouped_returns_expr(lag: usize) -> Expr {
    let close = col(CLOSE_COLUMN).cast(DataType::Float64);
    let lagged = close.clone().shift(lit(lag as i64)).over([col(CODE_COLUMN)]);
    (lagged / close - lit(1.0))
        .fill_nan(lit(0.0))
        .fill_null(lit(0.0))
        .alias(RETURNS_COLUMN)
}
