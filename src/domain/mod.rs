//! Core domain logic: market data, indicators, signal scoring, and the
//! portfolio ledger.

pub mod candle;
pub mod error;
pub mod indicator;
pub mod ledger;
pub mod money;
pub mod portfolio;
pub mod position;
pub mod risk;
pub mod scorer;
pub mod scorer_config;
pub mod signal;
pub mod transaction;
