//! Domain types for stockset

pub mod record;

pub use record::{
    PriceRecord, CLOSE_COLUMN, CODE_COLUMN, DATE_COLUMN, PRICE_FIELDS, RETURNS_COLUMN,
};

/// Instrument code, e.g. `sh.600000`.
pub type Code = String;
