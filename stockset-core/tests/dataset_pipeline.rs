//! Integration tests for dataset preparation over per-symbol CSV directories.

use std::fs;
use std::path::Path;
use stockset_core::dataset::meta::{hash_file, sidecar_path};
use stockset_core::dataset::{CsvDataSet, DataSet, DataSetConfig, DatasetError, DatasetMeta};

const HEADER: &str = "date,code,open,high,low,close,volume";

// ── Helpers ──────────────────────────────────────────────────────────

/// Write `{code}.csv` with one row per (date, close), dates given out of order on purpose.
fn write_symbol(dir: &Path, file: &str, code: &str, rows: &[(&str, f64)]) {
    let mut content = format!("{HEADER}\n");
    for (date, close) in rows {
        content.push_str(&format!(
            "{date},{code},{open},{high},{low},{close},1000\n",
            open = close - 0.1,
            high = close + 0.5,
            low = close - 0.5,
        ));
    }
    fs::write(dir.join(file), content).unwrap();
}

fn three_symbols(dir: &Path) {
    write_symbol(
        dir,
        "sh.600000.csv",
        "sh.600000",
        &[("2021-07-02", 11.0), ("2021-07-01", 10.0), ("2021-07-05", 12.0)],
    );
    write_symbol(
        dir,
        "sh.600036.csv",
        "sh.600036",
        &[("2021-07-01", 50.0), ("2021-07-02", 40.0)],
    );
    write_symbol(
        dir,
        "sz.000001.csv",
        "sz.000001",
        &[("2021-07-05", 20.0), ("2021-07-02", 25.0)],
    );
}

fn str_values(df: &polars::prelude::DataFrame, name: &str) -> Vec<String> {
    df.column(name)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap().to_string())
        .collect()
}

// ── Aggregation ──────────────────────────────────────────────────────

#[test]
fn union_of_files_sorted_by_date() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    three_symbols(src.path());

    let mut dataset = CsvDataSet::default();
    let data = dataset
        .prepare(src.path(), &out.path().join("all.csv"), false)
        .unwrap();

    assert_eq!(data.height(), 7);
    let dates = str_values(data.frame(), "date");
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted, "rows must be in ascending date order");

    // Within a date, rows keep file order
    let codes = str_values(data.frame(), "code");
    assert_eq!(
        codes,
        vec![
            "sh.600000", "sh.600036", // 07-01
            "sh.600000", "sh.600036", "sz.000001", // 07-02
            "sh.600000", "sz.000001", // 07-05
        ]
    );
    assert_eq!(
        data.columns(),
        vec!["date", "code", "open", "high", "low", "close", "volume", "returns"]
    );
}

#[test]
fn returns_never_cross_symbols() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    three_symbols(src.path());

    let mut dataset = CsvDataSet::default();
    let data = dataset
        .prepare(src.path(), &out.path().join("all.csv"), false)
        .unwrap();

    // First row of every symbol has no predecessor
    assert_eq!(data.returns_at("2021-07-01", "sh.600000"), Some(0.0));
    assert_eq!(data.returns_at("2021-07-01", "sh.600036"), Some(0.0));
    assert_eq!(data.returns_at("2021-07-02", "sz.000001"), Some(0.0));

    let close_ratio = |prev: f64, cur: f64| prev / cur - 1.0;
    let approx = |a: Option<f64>, b: f64| (a.unwrap() - b).abs() < 1e-12;
    assert!(approx(data.returns_at("2021-07-02", "sh.600000"), close_ratio(10.0, 11.0)));
    assert!(approx(data.returns_at("2021-07-05", "sh.600000"), close_ratio(11.0, 12.0)));
    assert!(approx(data.returns_at("2021-07-02", "sh.600036"), close_ratio(50.0, 40.0)));
    assert!(approx(data.returns_at("2021-07-05", "sz.000001"), close_ratio(25.0, 20.0)));
}

#[test]
fn file_with_extra_column_is_skipped() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    three_symbols(src.path());
    fs::write(
        src.path().join("sz.000002.csv"),
        format!("{HEADER},extra\n2021-07-01,sz.000002,1,1,1,1,1000,x\n"),
    )
    .unwrap();

    let mut dataset = CsvDataSet::default();
    let data = dataset
        .prepare(src.path(), &out.path().join("all.csv"), false)
        .unwrap();

    assert_eq!(data.height(), 7);
    assert!(!data.codes().unwrap().contains("sz.000002"));
    assert!(!data.columns().contains(&"extra".to_string()));
}

#[test]
fn existing_destination_is_rejected_without_writes() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    three_symbols(src.path());
    let dest = out.path().join("all.csv");
    fs::write(&dest, "keep me").unwrap();

    let err = CsvDataSet::default()
        .prepare(src.path(), &dest, true)
        .unwrap_err();

    assert!(matches!(err, DatasetError::AlreadyExists { .. }));
    assert_eq!(fs::read_to_string(&dest).unwrap(), "keep me");
    assert!(!sidecar_path(&dest).exists());
}

#[test]
fn leftover_sidecar_is_rejected_without_writes() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    three_symbols(src.path());
    let dest = out.path().join("all.csv");
    fs::write(sidecar_path(&dest), "{}").unwrap();
    fs::write(out.path().join("all.csv.tmp"), "partial").unwrap();

    let err = CsvDataSet::default()
        .prepare(src.path(), &dest, true)
        .unwrap_err();

    assert!(matches!(err, DatasetError::AlreadyExists { .. }));
    assert!(!dest.exists());
    assert_eq!(fs::read_to_string(sidecar_path(&dest)).unwrap(), "{}");
    assert_eq!(
        fs::read_to_string(out.path().join("all.csv.tmp")).unwrap(),
        "partial"
    );
}

#[test]
fn missing_source_is_not_found() {
    let out = tempfile::tempdir().unwrap();
    let err = CsvDataSet::default()
        .prepare(
            &out.path().join("no-such-dir"),
            &out.path().join("all.csv"),
            true,
        )
        .unwrap_err();
    assert!(matches!(err, DatasetError::NotFound { .. }));
}

#[test]
fn in_memory_prepare_removes_destination() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    three_symbols(src.path());
    let dest = out.path().join("all.csv");

    CsvDataSet::default()
        .prepare(src.path(), &dest, false)
        .unwrap();

    assert!(!dest.exists());
    assert!(!sidecar_path(&dest).exists());
}

#[test]
fn file_with_empty_key_is_skipped() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_symbol(src.path(), "a.csv", "sh.600000", &[("2021-07-01", 10.0)]);
    write_symbol(src.path(), "b.csv", "sh.600036", &[("", 50.0), ("2021-07-02", 40.0)]);
    write_symbol(src.path(), "c.csv", "sz.000001", &[("2021-07-01", 20.0)]);

    let mut dataset = CsvDataSet::default();
    let data = dataset
        .prepare(src.path(), &out.path().join("all.csv"), false)
        .unwrap();

    assert_eq!(data.height(), 2);
    let codes: Vec<String> = data.codes().unwrap().into_iter().collect();
    assert_eq!(codes, vec!["sh.600000", "sz.000001"]);
}

#[test]
fn file_with_repeated_key_is_skipped() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_symbol(src.path(), "a.csv", "sh.600000", &[("2021-07-01", 10.0)]);
    write_symbol(
        src.path(),
        "b.csv",
        "sh.600036",
        &[("2021-07-01", 50.0), ("2021-07-01", 51.0)],
    );
    write_symbol(src.path(), "c.csv", "sz.000001", &[("2021-07-01", 20.0)]);
    let dest = out.path().join("all.csv");

    let mut dataset = CsvDataSet::default();
    let data = dataset.prepare(src.path(), &dest, true).unwrap();

    assert_eq!(data.height(), 2);
    assert!(data.position("2021-07-01", "sh.600000").is_some());
    assert!(data.position("2021-07-01", "sz.000001").is_some());
    assert!(data.position("2021-07-01", "sh.600036").is_none());
    assert!(dest.exists());
}

#[test]
fn longer_lag_zeroes_leading_rows_per_symbol() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_symbol(
        src.path(),
        "sh.600000.csv",
        "sh.600000",
        &[("2021-07-05", 4.0), ("2021-07-01", 8.0), ("2021-07-02", 10.0)],
    );
    write_symbol(
        src.path(),
        "sz.000001.csv",
        "sz.000001",
        &[("2021-07-01", 30.0), ("2021-07-02", 20.0), ("2021-07-05", 10.0)],
    );

    let mut dataset = CsvDataSet::new(DataSetConfig {
        delay_day: 2,
        use_multi_index: true,
    });
    let data = dataset
        .prepare(src.path(), &out.path().join("all.csv"), false)
        .unwrap();

    assert_eq!(data.returns_at("2021-07-01", "sh.600000"), Some(0.0));
    assert_eq!(data.returns_at("2021-07-02", "sh.600000"), Some(0.0));
    assert_eq!(data.returns_at("2021-07-05", "sh.600000"), Some(1.0));
    assert_eq!(data.returns_at("2021-07-01", "sz.000001"), Some(0.0));
    assert_eq!(data.returns_at("2021-07-02", "sz.000001"), Some(0.0));
    assert_eq!(data.returns_at("2021-07-05", "sz.000001"), Some(2.0));
}

// ── Persistence ──────────────────────────────────────────────────────

#[test]
fn persisted_dataset_loads_back() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    three_symbols(src.path());
    let dest = out.path().join("all.csv");

    let mut prepared = CsvDataSet::default();
    let (rows, columns) = {
        let data = prepared.prepare(src.path(), &dest, true).unwrap();
        (data.height(), data.columns())
    };
    assert!(dest.exists());

    let mut loaded = CsvDataSet::default();
    let data = loaded.load(&dest).unwrap();
    assert_eq!(data.height(), rows);
    assert_eq!(data.columns(), columns);
    assert!(data.is_indexed());
    let before = prepared.data().unwrap().returns_at("2021-07-02", "sh.600036").unwrap();
    let after = data.returns_at("2021-07-02", "sh.600036").unwrap();
    assert!((before - after).abs() < 1e-12);

    let meta = DatasetMeta::read(&sidecar_path(&dest)).unwrap();
    assert_eq!(meta.rows, 7);
    assert_eq!(meta.symbols, 3);
    assert_eq!(meta.start_date.as_deref(), Some("2021-07-01"));
    assert_eq!(meta.end_date.as_deref(), Some("2021-07-05"));
    assert_eq!(meta.content_hash, hash_file(&dest).unwrap());
}

#[test]
fn load_missing_file_is_not_found() {
    let out = tempfile::tempdir().unwrap();
    assert!(matches!(
        CsvDataSet::default().load(&out.path().join("none.csv")),
        Err(DatasetError::NotFound { .. })
    ));
}

// ── Splitting ────────────────────────────────────────────────────────

#[test]
fn split_of_prepared_dataset_is_chronological() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    three_symbols(src.path());

    let mut dataset = CsvDataSet::new(DataSetConfig::default());
    dataset
        .prepare(src.path(), &out.path().join("all.csv"), false)
        .unwrap();

    // 3 unique dates: floor(3 * 0.34) = 1 train, floor(3 * 0.33) = 0 validation, 2 test
    let split = dataset.split([0.34, 0.33, 0.33]).unwrap();
    assert_eq!(str_values(&split.train, "date"), vec!["2021-07-01"; 2]);
    assert_eq!(split.validation.height(), 0);
    assert_eq!(split.test.height(), 5);
}

#[test]
fn split_before_prepare_is_not_loaded() {
    let dataset = CsvDataSet::default();
    assert!(matches!(
        dataset.split([0.6, 0.2, 0.2]),
        Err(DatasetError::NotLoaded)
    ));
}
