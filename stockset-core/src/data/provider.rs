//! History provider trait and structured error types.
//!
//! The HistoryProvider trait abstracts over remote data sources so the
//! downloader can be driven by a vendor client or by the synthetic provider.
//! Providers answer with string cells, the way vendor query APIs do; typed
//! records are derived from those rows on demand.

use crate::domain::{PriceRecord, PRICE_FIELDS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structured error types for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not logged in to provider '{provider}'")]
    NotLoggedIn { provider: String },

    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("symbol not found: {code}")]
    SymbolNotFound { code: String },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("listing file {} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("row does not convert to a price record: {0}")]
    Record(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Indices whose constituents can be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Sz50,
    Hs300,
    Zz500,
}

impl IndexKind {
    /// Upper-case name used in saved file names.
    pub fn name(self) -> &'static str {
        match self {
            IndexKind::Sz50 => "SZ50",
            IndexKind::Hs300 => "HS300",
            IndexKind::Zz500 => "ZZ500",
        }
    }
}

/// Tabular query result: field names plus string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowSet {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a field in every row.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Convert rows into typed records. Requires all PriceRecord fields;
    /// empty cells become `None`.
    pub fn to_price_records(&self) -> Result<Vec<PriceRecord>, FetchError> {
        let missing: Vec<&str> = PRICE_FIELDS
            .iter()
            .copied()
            .filter(|field| self.column(field).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(FetchError::Record(format!(
                "missing field(s) {}",
                missing.join(", ")
            )));
        }
        let headers = csv::StringRecord::from(self.fields.clone());
        self.rows
            .iter()
            .map(|row| {
                let record = csv::StringRecord::from(row.clone());
                record
                    .deserialize::<PriceRecord>(Some(&headers))
                    .map_err(|e| FetchError::Record(e.to_string()))
            })
            .collect()
    }

    /// Write header and rows to a CSV file without an index column.
    pub fn write_csv(&self, path: &Path) -> Result<(), FetchError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.fields)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Trait for remote history providers.
///
/// A session is bracketed by `login` and `logout`; queries outside a session
/// fail with `FetchError::NotLoggedIn`.
pub trait HistoryProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn login(&mut self) -> Result<(), FetchError>;

    /// Daily history of one instrument over an inclusive date range,
    /// restricted to the requested fields.
    fn query_history(
        &mut self,
        code: &str,
        fields: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RowSet, FetchError>;

    /// All instruments listed on a date (`code`, `tradeStatus`, `code_name`).
    fn query_listing(&mut self, date: NaiveDate) -> Result<RowSet, FetchError>;

    /// Constituents of an index on a date. Empty on non-trading days.
    fn query_index_members(
        &mut self,
        index: IndexKind,
        date: NaiveDate,
    ) -> Result<RowSet, FetchError>;

    fn logout(&mut self) -> Result<(), FetchError>;
}
