#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use coinledger::domain::candle::{Candle, PriceSeries};
use coinledger::domain::error::CoinledgerError;
use coinledger::domain::portfolio::Portfolio;
use coinledger::domain::position::Position;
use coinledger::domain::transaction::{Side, TradeIntent, Transaction};
use coinledger::ports::data_port::MarketDataPort;
use coinledger::ports::store_port::{BookRecord, LedgerStorePort};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + chrono::TimeDelta::minutes(minute)
}

pub fn make_candle(minute: i64, close: f64, volume: f64) -> Candle {
    Candle {
        timestamp: at(minute),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume,
    }
}

pub fn make_series(symbol: &str, closes: &[f64]) -> PriceSeries {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_candle(i as i64, close, 1000.0))
        .collect();
    PriceSeries::normalize(symbol, candles).unwrap()
}

pub fn make_intent(symbol: &str, side: Side, quantity: Decimal, price: Decimal) -> TradeIntent {
    TradeIntent {
        symbol: symbol.to_string(),
        side,
        quantity,
        price,
        fee: Decimal::ZERO,
        order_ref: "test".into(),
        executed_at: at(0),
    }
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Candle>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.data.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_candles(&self, symbol: &str) -> Result<PriceSeries, CoinledgerError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(CoinledgerError::Data {
                reason: reason.clone(),
            });
        }
        let candles = self.data.get(symbol).cloned().unwrap_or_default();
        PriceSeries::normalize(symbol, candles)
    }

    fn list_symbols(&self) -> Result<Vec<String>, CoinledgerError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Store that fails every `record_trade` after the first `allow` calls.
/// Lets tests prove that a persistence failure leaves the in-memory
/// ledger untouched.
pub struct FailingStore {
    allow: usize,
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn new(allow: usize) -> Self {
        Self {
            allow,
            calls: AtomicUsize::new(0),
        }
    }
}

impl LedgerStorePort for FailingStore {
    fn create_portfolio(&self, _portfolio: &Portfolio) -> Result<(), CoinledgerError> {
        Ok(())
    }

    fn record_trade(
        &self,
        _portfolio: &Portfolio,
        _position: &Position,
        _transaction: &Transaction,
    ) -> Result<(), CoinledgerError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.allow {
            Ok(())
        } else {
            Err(CoinledgerError::Database {
                reason: "disk full".into(),
            })
        }
    }

    fn record_valuation(
        &self,
        _portfolio: &Portfolio,
        _positions: &[Position],
    ) -> Result<(), CoinledgerError> {
        Ok(())
    }

    fn load_books(&self) -> Result<Vec<BookRecord>, CoinledgerError> {
        Ok(Vec::new())
    }
}
