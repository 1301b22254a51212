//! Deterministic synthetic provider for offline runs and tests.
//!
//! Prices are a random walk seeded from the BLAKE3 hash of the instrument
//! code, so the same code and date range always produce the same rows.
//! Weekends are treated as non-trading days everywhere.

use super::provider::{FetchError, HistoryProvider, IndexKind, RowSet};
use crate::domain::PriceRecord;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Instruments known to the synthetic provider: (code, name).
const DEFAULT_UNIVERSE: [(&str, &str); 6] = [
    ("sh.000001", "上证综合指数"),
    ("sh.600000", "浦发银行"),
    ("sh.600036", "招商银行"),
    ("sh.601318", "中国平安"),
    ("sz.000001", "平安银行"),
    ("sz.000002", "万科A"),
];

/// Synthetic history provider.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    universe: Vec<(String, String)>,
    logged_in: bool,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::with_universe(
            DEFAULT_UNIVERSE
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
        )
    }

    /// Provider listing exactly the given (code, name) pairs.
    pub fn with_universe(universe: Vec<(String, String)>) -> Self {
        Self {
            universe,
            logged_in: false,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    fn ensure_session(&self) -> Result<(), FetchError> {
        if self.logged_in {
            Ok(())
        } else {
            Err(FetchError::NotLoggedIn {
                provider: self.name().to_string(),
            })
        }
    }

    fn stocks(&self) -> impl Iterator<Item = &(String, String)> {
        self.universe.iter().filter(|(_, name)| !name.contains("指数"))
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Generate daily records for one code between two dates (inclusive).
pub fn generate_records(code: &str, start: NaiveDate, end: NaiveDate) -> Vec<PriceRecord> {
    // Deterministic seed from the code
    let seed: [u8; 32] = *blake3::hash(code.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut records = Vec::new();
    let mut price = rng.gen_range(5.0..50.0_f64);
    let mut current = start;

    while current <= end {
        if is_weekend(current) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.05..0.05);
        let preclose = price;
        let open = preclose * (1.0 + rng.gen_range(-0.01..0.01));
        let close = preclose * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(100_000..5_000_000u64);

        records.push(PriceRecord {
            date: current,
            code: code.to_string(),
            open: Some(round(open, 2)),
            high: Some(round(high, 2)),
            low: Some(round(low, 2)),
            close: Some(round(close, 2)),
            preclose: Some(round(preclose, 2)),
            volume: Some(volume),
            amount: Some(round(volume as f64 * close, 2)),
            adjust_flag: Some(3),
            turnover: Some(round(rng.gen_range(0.1..3.0), 4)),
            trade_status: Some(1),
            pct_change: Some(round(daily_return * 100.0, 4)),
            is_st: Some(0),
        });

        price = round(close, 2);
        current += chrono::Duration::days(1);
    }

    records
}

fn round(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

impl HistoryProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn login(&mut self) -> Result<(), FetchError> {
        self.logged_in = true;
        Ok(())
    }

    fn query_history(
        &mut self,
        code: &str,
        fields: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RowSet, FetchError> {
        self.ensure_session()?;
        if !self.universe.iter().any(|(c, _)| c == code) {
            return Err(FetchError::SymbolNotFound {
                code: code.to_string(),
            });
        }

        let mut rows = RowSet::new(fields.to_vec());
        for record in generate_records(code, start, end) {
            let row = fields
                .iter()
                .map(|field| {
                    record
                        .cell(field)
                        .ok_or_else(|| FetchError::UnknownField(field.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn query_listing(&mut self, date: NaiveDate) -> Result<RowSet, FetchError> {
        self.ensure_session()?;
        let mut rows = RowSet::new(vec![
            "code".into(),
            "tradeStatus".into(),
            "code_name".into(),
        ]);
        if is_weekend(date) {
            return Ok(rows);
        }
        for (code, name) in &self.universe {
            rows.push(vec![code.clone(), "1".into(), name.clone()]);
        }
        Ok(rows)
    }

    fn query_index_members(
        &mut self,
        index: IndexKind,
        date: NaiveDate,
    ) -> Result<RowSet, FetchError> {
        self.ensure_session()?;
        let mut rows = RowSet::new(vec![
            "updateDate".into(),
            "code".into(),
            "code_name".into(),
        ]);
        if is_weekend(date) {
            return Ok(rows);
        }
        let size = match index {
            IndexKind::Sz50 => 3,
            IndexKind::Hs300 => 4,
            IndexKind::Zz500 => 5,
        };
        let update_date = date.format("%Y-%m-%d").to_string();
        for (code, name) in self.stocks().take(size) {
            rows.push(vec![update_date.clone(), code.clone(), name.clone()]);
        }
        Ok(rows)
    }

    fn logout(&mut self) -> Result<(), FetchError> {
        self.ensure_session()?;
        self.logged_in = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PRICE_FIELDS;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn all_fields() -> Vec<String> {
        PRICE_FIELDS.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn records_are_deterministic() {
        let a = generate_records("sh.600000", date(2021, 1, 1), date(2021, 1, 31));
        let b = generate_records("sh.600000", date(2021, 1, 1), date(2021, 1, 31));
        assert_eq!(a, b);
    }

    #[test]
    fn different_codes_get_different_prices() {
        let a = generate_records("sh.600000", date(2021, 1, 4), date(2021, 1, 8));
        let b = generate_records("sz.000002", date(2021, 1, 4), date(2021, 1, 8));
        assert_eq!(a.len(), b.len());
        assert_ne!(a[0].close, b[0].close);
    }

    #[test]
    fn weekends_are_skipped() {
        // 2021-01-02 and 2021-01-03 are a weekend
        let records = generate_records("sh.600000", date(2021, 1, 1), date(2021, 1, 4));
        let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2021, 1, 1), date(2021, 1, 4)]);
    }

    #[test]
    fn bars_are_sane() {
        for r in generate_records("sh.600036", date(2020, 1, 1), date(2020, 12, 31)) {
            let (high, low) = (r.high.unwrap(), r.low.unwrap());
            assert!(high >= low);
            assert!(r.close.unwrap() > 0.0);
        }
    }

    #[test]
    fn queries_require_login() {
        let mut provider = SyntheticProvider::new();
        let err = provider.query_listing(date(2021, 7, 1)).unwrap_err();
        assert!(matches!(err, FetchError::NotLoggedIn { .. }));
    }

    #[test]
    fn history_rows_convert_to_records() {
        let mut provider = SyntheticProvider::new();
        provider.login().unwrap();
        let rows = provider
            .query_history("sh.600000", &all_fields(), date(2021, 6, 28), date(2021, 7, 2))
            .unwrap();
        assert_eq!(rows.len(), 5);

        let records = rows.to_price_records().unwrap();
        assert_eq!(
            records,
            generate_records("sh.600000", date(2021, 6, 28), date(2021, 7, 2))
        );
        provider.logout().unwrap();
        assert!(!provider.is_logged_in());
    }

    #[test]
    fn history_rejects_unknown_code_and_field() {
        let mut provider = SyntheticProvider::new();
        provider.login().unwrap();

        let err = provider
            .query_history("sh.999999", &all_fields(), date(2021, 7, 1), date(2021, 7, 1))
            .unwrap_err();
        assert!(matches!(err, FetchError::SymbolNotFound { .. }));

        let err = provider
            .query_history("sh.600000", &["peTTM".to_string()], date(2021, 7, 1), date(2021, 7, 1))
            .unwrap_err();
        assert!(matches!(err, FetchError::UnknownField(_)));
    }

    #[test]
    fn listing_and_index_members_are_empty_on_weekends() {
        let mut provider = SyntheticProvider::new();
        provider.login().unwrap();

        assert!(provider.query_listing(date(2021, 7, 3)).unwrap().is_empty());
        assert_eq!(provider.query_listing(date(2021, 7, 1)).unwrap().len(), 6);

        assert!(provider
            .query_index_members(IndexKind::Sz50, date(2021, 7, 4))
            .unwrap()
            .is_empty());
        let members = provider
            .query_index_members(IndexKind::Sz50, date(2021, 7, 1))
            .unwrap();
        assert_eq!(members.len(), 3);
        assert!(members.rows.iter().all(|row| !row[2].contains("指数")));
    }
}
