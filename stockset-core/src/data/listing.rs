//! Listing files: which instruments were listed on a given date.
//!
//! A listing is saved as `{date}-stock_ids.csv` with the provider's
//! `code,tradeStatus,code_name` columns. Index instruments share the listing
//! with stocks and are recognised by `指数` ("index") in their name.

use super::provider::FetchError;
use crate::domain::Code;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const INDEX_MARKER: &str = "指数";

/// Which listing(s) decide the set of codes to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DumpMode {
    /// Codes listed on the start date.
    StartDate,
    /// Codes listed on the end date.
    #[default]
    EndDate,
    /// Codes listed on both dates.
    Intersection,
    /// Codes listed on either date.
    Union,
}

impl DumpMode {
    pub fn needs_start_listing(self) -> bool {
        self != DumpMode::EndDate
    }

    pub fn needs_end_listing(self) -> bool {
        self != DumpMode::StartDate
    }
}

/// `{dir}/{date}-stock_ids.csv`
pub fn listing_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}-stock_ids.csv", date.format("%Y-%m-%d")))
}

/// Read stock codes from a listing file.
///
/// Rows with any empty cell are dropped, as are index instruments.
pub fn read_listing_codes(path: &Path) -> Result<Vec<Code>, FetchError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let position = |column: &str| {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| FetchError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })
    };
    let code_at = position("code")?;
    let name_at = position("code_name")?;

    let mut codes = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().any(|cell| cell.trim().is_empty()) {
            continue;
        }
        let name = row.get(name_at).unwrap_or_default();
        if name.contains(INDEX_MARKER) {
            continue;
        }
        if let Some(code) = row.get(code_at) {
            codes.push(code.to_string());
        }
    }
    Ok(codes)
}

/// Combine start/end listings according to the dump mode.
///
/// Single-listing modes keep the listing's order; set modes return codes sorted.
pub fn select_codes(mode: DumpMode, start: &[Code], end: &[Code]) -> Vec<Code> {
    match mode {
        DumpMode::StartDate => start.to_vec(),
        DumpMode::EndDate => end.to_vec(),
        DumpMode::Intersection => {
            let end: BTreeSet<&Code> = end.iter().collect();
            start
                .iter()
                .filter(|c| end.contains(c))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .cloned()
                .collect()
        }
        DumpMode::Union => start
            .iter()
            .chain(end.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(list: &[&str]) -> Vec<Code> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn listing_path_uses_iso_date() {
        let path = listing_path(Path::new("/data"), NaiveDate::from_ymd_opt(2021, 7, 1).unwrap());
        assert_eq!(path, PathBuf::from("/data/2021-07-01-stock_ids.csv"));
    }

    #[test]
    fn read_listing_drops_indices_and_incomplete_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing.csv");
        std::fs::write(
            &path,
            "code,tradeStatus,code_name\n\
             sh.000001,1,上证综合指数\n\
             sh.600000,1,浦发银行\n\
             sh.600001,1,\n\
             sz.000001,1,平安银行\n",
        )
        .unwrap();

        let read = read_listing_codes(&path).unwrap();
        assert_eq!(read, codes(&["sh.600000", "sz.000001"]));
    }

    #[test]
    fn read_listing_requires_code_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing.csv");
        std::fs::write(&path, "code,tradeStatus\nsh.600000,1\n").unwrap();

        let err = read_listing_codes(&path).unwrap_err();
        assert!(matches!(err, FetchError::MissingColumn { ref column, .. } if column == "code_name"));
    }

    #[test]
    fn select_codes_by_mode() {
        let start = codes(&["sh.600004", "sh.600000", "sh.600001"]);
        let end = codes(&["sh.600001", "sh.600004", "sh.600009"]);

        assert_eq!(select_codes(DumpMode::StartDate, &start, &end), start);
        assert_eq!(select_codes(DumpMode::EndDate, &start, &end), end);
        assert_eq!(
            select_codes(DumpMode::Intersection, &start, &end),
            codes(&["sh.600001", "sh.600004"])
        );
        assert_eq!(
            select_codes(DumpMode::Union, &start, &end),
            codes(&["sh.600000", "sh.600001", "sh.600004", "sh.600009"])
        );
    }

    #[test]
    fn mode_listing_requirements() {
        assert!(!DumpMode::EndDate.needs_start_listing());
        assert!(DumpMode::EndDate.needs_end_listing());
        assert!(DumpMode::StartDate.needs_start_listing());
        assert!(!DumpMode::StartDate.needs_end_listing());
        assert!(DumpMode::Union.needs_start_listing() && DumpMode::Union.needs_end_listing());
    }
}
