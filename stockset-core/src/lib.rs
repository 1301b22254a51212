//! Stockset Core: daily stock price acquisition and dataset preparation.
//!
//! This crate contains:
//! - The per-symbol price record and its column names
//! - The history provider interface, a synthetic provider and the download orchestrator
//! - Aggregation of per-symbol CSV files into one date-ordered dataset with returns
//! - Chronological train / validation / test splitting
//! - TOML configuration and progress reporting

pub mod config;
pub mod data;
pub mod dataset;
pub mod domain;
pub mod progress;
