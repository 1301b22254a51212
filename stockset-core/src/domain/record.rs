//! PriceRecord: one trading day of one instrument.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-symbol file columns, in on-disk order, named the way the provider names them.
pub const PRICE_FIELDS: [&str; 14] = [
    "date",
    "code",
    "open",
    "high",
    "low",
    "close",
    "preclose",
    "volume",
    "amount",
    "adjustflag",
    "turn",
    "tradestatus",
    "pctChg",
    "isST",
];

pub const DATE_COLUMN: &str = "date";
pub const CODE_COLUMN: &str = "code";
pub const CLOSE_COLUMN: &str = "close";
pub const RETURNS_COLUMN: &str = "returns";

/// Daily record for a single instrument.
///
/// Identity key is `(date, code)`. Numeric fields are optional because the
/// provider leaves cells empty on suspended days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub code: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub preclose: Option<f64>,
    pub volume: Option<u64>,
    pub amount: Option<f64>,
    #[serde(rename = "adjustflag")]
    pub adjust_flag: Option<u8>,
    #[serde(rename = "turn")]
    pub turnover: Option<f64>,
    #[serde(rename = "tradestatus")]
    pub trade_status: Option<u8>,
    #[serde(rename = "pctChg")]
    pub pct_change: Option<f64>,
    #[serde(rename = "isST")]
    pub is_st: Option<u8>,
}

impl PriceRecord {
    /// True when the instrument traded normally that day.
    pub fn is_trading(&self) -> bool {
        self.trade_status == Some(1)
    }

    /// Render one field as a CSV cell, using the provider's field name.
    ///
    /// Returns `None` for a name that is not a PriceRecord field; a missing
    /// value renders as an empty cell.
    pub fn cell(&self, field: &str) -> Option<String> {
        fn opt<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        let cell = match field {
            "date" => self.date.format("%Y-%m-%d").to_string(),
            "code" => self.code.clone(),
            "open" => opt(self.open),
            "high" => opt(self.high),
            "low" => opt(self.low),
            "close" => opt(self.close),
            "preclose" => opt(self.preclose),
            "volume" => opt(self.volume),
            "amount" => opt(self.amount),
            "adjustflag" => opt(self.adjust_flag),
            "turn" => opt(self.turnover),
            "tradestatus" => opt(self.trade_status),
            "pctChg" => opt(self.pct_change),
            "isST" => opt(self.is_st),
            _ => return None,
        };
        Some(cell)
    }
}
