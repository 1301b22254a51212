//! Canonical schema of an aggregation run.
//!
//! The first accepted per-symbol frame fixes the ordered column list; every
//! later frame must carry exactly the same list.

use polars::prelude::*;
use std::fmt;

/// Ordered column names of a frame.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Names from `required` that `df` lacks.
pub fn missing_columns(df: &DataFrame, required: &[&str]) -> Vec<String> {
    let present = column_names(df);
    required
        .iter()
        .filter(|name| !present.iter().any(|p| p == *name))
        .map(|name| name.to_string())
        .collect()
}

/// The column list every accepted frame must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSchema {
    columns: Vec<String>,
}

impl CanonicalSchema {
    pub fn from_frame(df: &DataFrame) -> Self {
        Self {
            columns: column_names(df),
        }
    }

    /// Ok when `df` has exactly the canonical columns in canonical order.
    pub fn check(&self, df: &DataFrame) -> Result<(), SchemaDiff> {
        let actual = column_names(df);
        if actual == self.columns {
            return Ok(());
        }
        Err(SchemaDiff::between(&self.columns, &actual))
    }
}

/// How a frame's columns differ from the canonical ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDiff {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    /// Same set of names, different order.
    pub reordered: bool,
}

impl SchemaDiff {
    fn between(expected: &[String], actual: &[String]) -> Self {
        let missing: Vec<String> = expected
            .iter()
            .filter(|c| !actual.contains(c))
            .cloned()
            .collect();
        let extra: Vec<String> = actual
            .iter()
            .filter(|c| !expected.contains(c))
            .cloned()
            .collect();
        let reordered = missing.is_empty() && extra.is_empty();
        Self {
            missing,
            extra,
            reordered,
        }
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reordered {
            return write!(f, "columns are in a different order");
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing [{}]", self.missing.join(", ")));
        }
        if !self.extra.is_empty() {
            parts.push(format!("extra [{}]", self.extra.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}
