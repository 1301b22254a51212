//! Download orchestrator: listing, history and index-constituent dumps.
//!
//! Every operation runs inside a single provider session: login once, do the
//! work, then always attempt logout. Per-symbol history failures are collected
//! into a summary instead of aborting the batch.

use super::listing::{listing_path, read_listing_codes, select_codes, DumpMode};
use super::provider::{FetchError, HistoryProvider, IndexKind};
use crate::domain::{Code, PRICE_FIELDS};
use crate::progress::Progress;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn, Span};

/// Parameters of a history dump.
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub fields: Vec<String>,
    pub mode: DumpMode,
    /// Where `{date}-stock_ids.csv` files are read from (and downloaded to when missing).
    pub listing_dir: PathBuf,
    /// Where `{code}.csv` files are written.
    pub save_dir: PathBuf,
}

impl HistoryRequest {
    /// Request for all PriceRecord fields, listings kept next to the data.
    pub fn new(start: NaiveDate, end: NaiveDate, save_dir: impl Into<PathBuf>) -> Self {
        let save_dir = save_dir.into();
        Self {
            start,
            end,
            fields: default_fields(),
            mode: DumpMode::default(),
            listing_dir: save_dir.clone(),
            save_dir,
        }
    }
}

/// The full PriceRecord field list, as owned strings.
pub fn default_fields() -> Vec<String> {
    PRICE_FIELDS.iter().map(|f| f.to_string()).collect()
}

/// Summary of a batch download operation.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(Code, FetchError)>,
    pub files: Vec<PathBuf>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Drives a provider to populate per-symbol directories.
pub struct Downloader<P> {
    provider: P,
    span: Span,
}

impl<P: HistoryProvider> Downloader<P> {
    pub fn new(provider: P) -> Self {
        let span = tracing::info_span!("fetch", provider = provider.name());
        Self { provider, span }
    }

    /// Log all events of this downloader under the given span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn into_inner(self) -> P {
        self.provider
    }

    /// Download the listing of `date` to `{save_dir}/{date}-stock_ids.csv`.
    pub fn dump_listing(&mut self, date: NaiveDate, save_dir: &Path) -> Result<PathBuf, FetchError> {
        let _entered = self.span.clone().entered();
        self.with_session(|provider| write_listing(provider, date, save_dir))
    }

    /// Download the history of every code selected by the request's listings.
    pub fn dump_history(
        &mut self,
        request: &HistoryRequest,
        progress: &dyn Progress,
    ) -> Result<DownloadSummary, FetchError> {
        let _entered = self.span.clone().entered();
        self.with_session(|provider| {
            let codes = resolve_codes(provider, request)?;
            ensure_dir(&request.save_dir)?;
            info!(
                codes = codes.len(),
                start = %request.start,
                end = %request.end,
                dir = %request.save_dir.display(),
                "downloading history"
            );
            Ok(download_codes(provider, request, &codes, progress))
        })
    }

    /// Download index constituents for every day in `[start, end]`.
    ///
    /// Days without constituents (non-trading days) produce no file. Returns the
    /// written `{INDEX}_{date}.csv` paths.
    pub fn dump_index_members(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        index: IndexKind,
        save_dir: &Path,
    ) -> Result<Vec<PathBuf>, FetchError> {
        let _entered = self.span.clone().entered();
        self.with_session(|provider| {
            ensure_dir(save_dir)?;
            let mut written = Vec::new();
            let mut day = start;
            while day <= end {
                let rows = provider.query_index_members(index, day)?;
                if !rows.is_empty() {
                    let path = save_dir.join(format!(
                        "{}_{}.csv",
                        index.name(),
                        day.format("%Y-%m-%d")
                    ));
                    rows.write_csv(&path)?;
                    debug!(index = index.name(), date = %day, members = rows.len(), "saved constituents");
                    written.push(path);
                }
                day += chrono::Duration::days(1);
            }
            info!(index = index.name(), files = written.len(), "index constituents downloaded");
            Ok(written)
        })
    }

    fn with_session<T>(
        &mut self,
        work: impl FnOnce(&mut P) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        self.provider.login()?;
        let result = work(&mut self.provider);
        if let Err(e) = self.provider.logout() {
            warn!(error = %e, "logout failed");
        }
        result
    }
}

fn ensure_dir(dir: &Path) -> Result<(), FetchError> {
    if !dir.exists() {
        info!(dir = %dir.display(), "creating directory");
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_listing<P: HistoryProvider>(
    provider: &mut P,
    date: NaiveDate,
    save_dir: &Path,
) -> Result<PathBuf, FetchError> {
    ensure_dir(save_dir)?;
    let rows = provider.query_listing(date)?;
    let path = listing_path(save_dir, date);
    rows.write_csv(&path)?;
    info!(date = %date, instruments = rows.len(), path = %path.display(), "listing downloaded");
    Ok(path)
}

/// Read the listing for `date`, downloading it first when the file is missing.
fn listing_codes<P: HistoryProvider>(
    provider: &mut P,
    date: NaiveDate,
    dir: &Path,
) -> Result<Vec<Code>, FetchError> {
    let path = listing_path(dir, date);
    if !path.exists() {
        warn!(date = %date, path = %path.display(), "listing missing, downloading it");
        write_listing(provider, date, dir)?;
    }
    read_listing_codes(&path)
}

fn resolve_codes<P: HistoryProvider>(
    provider: &mut P,
    request: &HistoryRequest,
) -> Result<Vec<Code>, FetchError> {
    let start = if request.mode.needs_start_listing() {
        listing_codes(provider, request.start, &request.listing_dir)?
    } else {
        Vec::new()
    };
    let end = if request.mode.needs_end_listing() {
        listing_codes(provider, request.end, &request.listing_dir)?
    } else {
        Vec::new()
    };
    Ok(select_codes(request.mode, &start, &end))
}

fn download_codes<P: HistoryProvider>(
    provider: &mut P,
    request: &HistoryRequest,
    codes: &[Code],
    progress: &dyn Progress,
) -> DownloadSummary {
    let total = codes.len();
    let mut errors = Vec::new();
    let mut files = Vec::new();

    for (i, code) in codes.iter().enumerate() {
        progress.on_start(code, i, total);

        let path = request.save_dir.join(format!("{code}.csv"));
        let result = provider
            .query_history(code, &request.fields, request.start, request.end)
            .and_then(|rows| rows.write_csv(&path));

        match result {
            Ok(()) => {
                debug!(code = %code, path = %path.display(), "saved history");
                progress.on_complete(code, i, total, None);
                files.push(path);
            }
            Err(e) => {
                warn!(code = %code, error = %e, "history download failed");
                progress.on_complete(code, i, total, Some(&e.to_string()));
                errors.push((code.clone(), e));
            }
        }
    }

    let failed = errors.len();
    let succeeded = total - failed;
    progress.on_batch_complete(succeeded, failed, total);

    DownloadSummary {
        total,
        succeeded,
        failed,
        errors,
        files,
    }
}
