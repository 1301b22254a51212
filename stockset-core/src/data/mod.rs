//! Data acquisition: provider interface, listings and download orchestration

pub mod download;
pub mod listing;
pub mod provider;
pub mod synthetic;

pub use download::{default_fields, DownloadSummary, Downloader, HistoryRequest};
pub use listing::{listing_path, read_listing_codes, select_codes, DumpMode};
pub use provider::{FetchError, HistoryProvider, IndexKind, RowSet};
pub use synthetic::SyntheticProvider;
