use super::schema::SchemaDiff;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from dataset preparation, loading and splitting.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("path not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("destination already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("columns of {file} differ from the canonical schema: {diff}")]
    SchemaMismatch { file: String, diff: SchemaDiff },

    #[error("malformed symbol file {file}: {reason}")]
    Malformed { file: String, reason: String },

    #[error("duplicate row for key (date={date}, code={code})")]
    DuplicateKey { date: String, code: String },

    #[error("row {row} has an empty date or code")]
    NullKey { row: usize },

    #[error("no usable symbol file in {}", dir.display())]
    NoUsableFiles { dir: PathBuf },

    #[error("invalid split ratios: {0}")]
    InvalidRatios(String),

    #[error("no dataset loaded; call prepare or load first")]
    NotLoaded,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DatasetError {
    /// Per-file failures that skip the file instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DatasetError::SchemaMismatch { .. } | DatasetError::Malformed { .. }
        )
    }
}
