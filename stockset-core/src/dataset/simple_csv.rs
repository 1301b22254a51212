//! CSV-backed dataset.
//!
//! Aggregation streams to disk: each accepted per-symbol frame is appended to
//! the destination file, which is read back once at the end, sorted by date
//! and then either rewritten in place or removed. Only one symbol file is held
//! in memory during the scan.
//!
//! Files are visited in file-name order. The first one that parses fixes the
//! canonical schema; later files with a different column list are skipped.
//! With the multi-index on, a file with an empty key, a repeated key, or a key
//! an earlier file already contributed is skipped as well.

use super::error::DatasetError;
use super::index::string_column;
use super::meta::{sidecar_path, DatasetMeta};
use super::returns::{grouped_returns_expr, returns_series};
use super::schema::{column_names, missing_columns, CanonicalSchema};
use super::{DataSet, DataSetConfig, Dataset};
use crate::domain::{CLOSE_COLUMN, CODE_COLUMN, DATE_COLUMN};
use crate::progress::{NoProgress, Progress};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn, Span};

type Key = (String, String);

/// Dataset stored as a single CSV file.
pub struct CsvDataSet {
    config: DataSetConfig,
    span: Span,
    progress: Box<dyn Progress>,
    data: Option<Dataset>,
}

impl CsvDataSet {
    pub fn new(config: DataSetConfig) -> Self {
        Self {
            config,
            span: tracing::info_span!("dataset"),
            progress: Box::new(NoProgress),
            data: None,
        }
    }

    /// Log all events of this dataset under the given span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Report per-file progress during `prepare`.
    pub fn with_progress(mut self, progress: impl Progress + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Recompute the `returns` column of the current dataset, per code, with
    /// the configured lag. Replaces an existing `returns` column.
    pub fn recompute_returns(&mut self) -> Result<&Dataset, DatasetError> {
        let span = self.span.clone();
        let _entered = span.enter();

        let current = self.data.as_ref().ok_or(DatasetError::NotLoaded)?;
        let frame = current
            .frame()
            .clone()
            .lazy()
            .with_column(grouped_returns_expr(self.config.delay_day))
            .collect()?;
        let dataset = current.with_frame(frame);
        debug!(delay_day = self.config.delay_day, "returns recomputed");
        Ok(self.data.insert(dataset))
    }

    /// Read one per-symbol file, sorted by date, with its `returns` column,
    /// plus its `(date, code)` keys when the multi-index is on.
    ///
    /// Every failure here is per-file and recoverable.
    fn load_symbol_frame(
        &self,
        path: &Path,
        schema: Option<&CanonicalSchema>,
        seen: &HashSet<Key>,
    ) -> Result<(DataFrame, Vec<Key>), DatasetError> {
        let file = file_label(path);
        let malformed = |reason: String| DatasetError::Malformed {
            file: file.clone(),
            reason,
        };

        let leading_index = has_leading_index(path).map_err(|e| malformed(e.to_string()))?;
        let mut frame = read_csv(path).map_err(|e| malformed(e.to_string()))?;
        if leading_index {
            let first = frame.get_column_names().first().map(|n| n.to_string());
            if let Some(first) = first {
                frame = frame.drop(&first).map_err(|e| malformed(e.to_string()))?;
            }
        }

        let required: &[&str] = if self.config.use_multi_index {
            &[DATE_COLUMN, CODE_COLUMN, CLOSE_COLUMN]
        } else {
            &[DATE_COLUMN, CLOSE_COLUMN]
        };
        let missing = missing_columns(&frame, required);
        if !missing.is_empty() {
            return Err(malformed(format!("missing column(s) {}", missing.join(", "))));
        }

        let mut frame = sort_by_date(&frame).map_err(|e| malformed(e.to_string()))?;
        let close = frame
            .column(CLOSE_COLUMN)
            .map_err(|e| malformed(e.to_string()))?
            .as_materialized_series()
            .clone();
        let returns =
            returns_series(&close, self.config.delay_day).map_err(|e| malformed(e.to_string()))?;
        frame
            .with_column(returns)
            .map_err(|e| malformed(e.to_string()))?;

        if let Some(schema) = schema {
            schema
                .check(&frame)
                .map_err(|diff| DatasetError::SchemaMismatch {
                    file: file.clone(),
                    diff,
                })?;
        }

        let keys = if self.config.use_multi_index {
            frame_keys(&frame, seen).map_err(malformed)?
        } else {
            Vec::new()
        };
        Ok((frame, keys))
    }

    /// Scan, append, reload, sort, then persist or discard.
    fn aggregate(
        &self,
        source_dir: &Path,
        dest: &Path,
        persist: bool,
    ) -> Result<Dataset, DatasetError> {
        let files = symbol_files(source_dir)?;
        let total = files.len();
        info!(
            source = %source_dir.display(),
            dest = %dest.display(),
            files = total,
            "concatenating symbol files"
        );

        let mut schema: Option<CanonicalSchema> = None;
        let mut seen: HashSet<Key> = HashSet::new();
        let mut accepted = 0usize;
        for (i, path) in files.iter().enumerate() {
            let label = file_label(path);
            self.progress.on_start(&label, i, total);

            match self.load_symbol_frame(path, schema.as_ref(), &seen) {
                Ok((mut frame, keys)) => {
                    if schema.is_none() {
                        debug!(file = %label, columns = ?column_names(&frame), "canonical schema");
                        schema = Some(CanonicalSchema::from_frame(&frame));
                    }
                    append_frame(dest, &mut frame, accepted == 0)?;
                    seen.extend(keys);
                    accepted += 1;
                    self.progress.on_complete(&label, i, total, None);
                }
                Err(err) if err.is_recoverable() => {
                    warn!(file = %label, error = %err, "skipping symbol file");
                    self.progress
                        .on_complete(&label, i, total, Some(&err.to_string()));
                }
                Err(err) => return Err(err),
            }
        }

        let skipped = total - accepted;
        self.progress.on_batch_complete(accepted, skipped, total);
        if accepted == 0 {
            return Err(DatasetError::NoUsableFiles {
                dir: source_dir.to_path_buf(),
            });
        }

        info!(accepted, skipped, "sorting by date");
        let frame = sort_by_date(&read_csv(dest)?)?;
        let dataset = Dataset::new(frame, self.config.use_multi_index)?;

        if persist {
            let mut frame = dataset.frame().clone();
            write_atomically(dest, &mut frame)?;
            DatasetMeta::describe(&dataset, dest, self.config.delay_day)?
                .write(&sidecar_path(dest))?;
            info!(rows = dataset.height(), path = %dest.display(), "dataset persisted");
        } else {
            fs::remove_file(dest)?;
            debug!(rows = dataset.height(), "dataset kept in memory only");
        }
        Ok(dataset)
    }
}

impl Default for CsvDataSet {
    fn default() -> Self {
        Self::new(DataSetConfig::default())
    }
}

impl DataSet for CsvDataSet {
    fn prepare(
        &mut self,
        source_dir: &Path,
        dest: &Path,
        persist: bool,
    ) -> Result<&Dataset, DatasetError> {
        let span = self.span.clone();
        let _entered = span.enter();

        if !source_dir.exists() {
            return Err(DatasetError::NotFound {
                path: source_dir.to_path_buf(),
            });
        }
        for path in [dest.to_path_buf(), tmp_path(dest), sidecar_path(dest)] {
            if path.exists() {
                return Err(DatasetError::AlreadyExists { path });
            }
        }

        match self.aggregate(source_dir, dest, persist) {
            Ok(dataset) => Ok(self.data.insert(dataset)),
            Err(err) => {
                discard(dest);
                Err(err)
            }
        }
    }

    fn load(&mut self, path: &Path) -> Result<&Dataset, DatasetError> {
        let span = self.span.clone();
        let _entered = span.enter();

        if !path.exists() {
            return Err(DatasetError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let frame = read_csv(path)?;
        let dataset = Dataset::new(frame, self.config.use_multi_index)?;
        info!(rows = dataset.height(), path = %path.display(), "dataset loaded");
        Ok(self.data.insert(dataset))
    }

    fn data(&self) -> Option<&Dataset> {
        self.data.as_ref()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Regular files of `dir`, sorted by file name.
fn symbol_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// True when the header row starts with an unnamed column, i.e. a written-out row index.
fn has_leading_index(path: &Path) -> Result<bool, ::csv::Error> {
    let mut reader = ::csv::Reader::from_path(path)?;
    let headers = reader.headers()?;
    Ok(headers.get(0).is_some_and(|h| h.trim().is_empty()))
}

fn read_csv(path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

/// Stable ascending sort: rows of the same date keep their relative order.
fn sort_by_date(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.sort(
        [DATE_COLUMN],
        SortMultipleOptions::default().with_maintain_order(true),
    )
}

fn append_frame(dest: &Path, frame: &mut DataFrame, header: bool) -> Result<(), DatasetError> {
    let file = OpenOptions::new().create(true).append(true).open(dest)?;
    let mut writer = BufWriter::new(file);
    CsvWriter::new(&mut writer)
        .include_header(header)
        .finish(frame)?;
    writer.flush()?;
    Ok(())
}

/// `{dest}.tmp`
fn tmp_path(dest: &Path) -> PathBuf {
    let mut tmp = dest.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Write to `{dest}.tmp`, then rename into place.
fn write_atomically(dest: &Path, frame: &mut DataFrame) -> Result<(), DatasetError> {
    let tmp = tmp_path(dest);
    {
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        CsvWriter::new(&mut writer)
            .include_header(true)
            .finish(frame)?;
        writer.flush()?;
    }
    fs::rename(&tmp, dest)?;
    Ok(())
}

/// `(date, code)` keys of a symbol frame.
///
/// Fails on an empty key, a key repeated inside the frame, or a key already
/// in `seen`.
fn frame_keys(frame: &DataFrame, seen: &HashSet<Key>) -> Result<Vec<Key>, String> {
    let dates = string_column(frame, DATE_COLUMN).map_err(|e| e.to_string())?;
    let codes = string_column(frame, CODE_COLUMN).map_err(|e| e.to_string())?;
    let dates = dates.str().map_err(|e| e.to_string())?;
    let codes = codes.str().map_err(|e| e.to_string())?;

    let mut keys = Vec::with_capacity(frame.height());
    let mut own: HashSet<Key> = HashSet::with_capacity(frame.height());
    for (row, (date, code)) in dates.into_iter().zip(codes).enumerate() {
        let (Some(date), Some(code)) = (date, code) else {
            return Err(format!("row {row} has an empty date or code"));
        };
        let key = (date.to_string(), code.to_string());
        if seen.contains(&key) {
            return Err(format!(
                "key (date={date}, code={code}) already taken by an earlier file"
            ));
        }
        if !own.insert(key.clone()) {
            return Err(format!("duplicate row for key (date={date}, code={code})"));
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Remove a half-built destination after a failed run.
fn discard(dest: &Path) {
    if dest.exists() {
        if let Err(e) = fs::remove_file(dest) {
            warn!(path = %dest.display(), error = %e, "could not remove partial dataset");
        }
    }
}
