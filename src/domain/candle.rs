//! OHLCV candles and the market data normalizer.
//!
//! Raw exchange feeds arrive in arbitrary order and occasionally carry
//! duplicate bars. [`PriceSeries::normalize`] is the only way to build a
//! series: it sorts by timestamp and rejects duplicates, so every consumer
//! can rely on strictly increasing timestamps.

use chrono::{DateTime, TimeDelta, Utc};

use super::error::CoinledgerError;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A strictly time-ordered candle series for one symbol. Read-only input to
/// the indicator library and signal scorer.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    symbol: String,
    candles: Vec<Candle>,
}

impl PriceSeries {
    pub fn normalize(
        symbol: impl Into<String>,
        mut candles: Vec<Candle>,
    ) -> Result<Self, CoinledgerError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(CoinledgerError::Data {
                reason: "empty symbol".into(),
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        for pair in candles.windows(2) {
            if pair[0].timestamp == pair[1].timestamp {
                return Err(CoinledgerError::Data {
                    reason: format!(
                        "duplicate candle for {} at {}",
                        symbol, pair[0].timestamp
                    ),
                });
            }
        }

        Ok(Self { symbol, candles })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// A series is stale when its newest bar is older than `max_age`
    /// relative to `now`. Empty series are always stale.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: TimeDelta) -> bool {
        match self.latest() {
            Some(candle) => now - candle.timestamp > max_age,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap()
    }

    fn candle(minute: u32, close: f64) -> Candle {
        Candle {
            timestamp: ts(minute),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn normalize_sorts_out_of_order_candles() {
        let series = PriceSeries::normalize(
            "BTC-USD",
            vec![candle(3, 103.0), candle(1, 101.0), candle(2, 102.0)],
        )
        .unwrap();

        let closes = series.closes();
        assert_eq!(closes, vec![101.0, 102.0, 103.0]);
        assert!(
            series
                .candles()
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp)
        );
    }

    #[test]
    fn normalize_rejects_duplicate_timestamps() {
        let result =
            PriceSeries::normalize("BTC-USD", vec![candle(1, 101.0), candle(1, 102.0)]);
        match result {
            Err(CoinledgerError::Data { reason }) => {
                assert!(reason.contains("duplicate"), "got: {reason}");
            }
            other => panic!("expected Data error, got {other:?}"),
        }
    }

    #[test]
    fn normalize_rejects_empty_symbol() {
        let result = PriceSeries::normalize("  ", vec![candle(1, 101.0)]);
        assert!(matches!(result, Err(CoinledgerError::Data { .. })));
    }

    #[test]
    fn empty_series_is_allowed_and_stale() {
        let series = PriceSeries::normalize("BTC-USD", vec![]).unwrap();
        assert!(series.is_empty());
        assert!(series.is_stale(ts(0), TimeDelta::hours(1)));
    }

    #[test]
    fn staleness_threshold() {
        let series = PriceSeries::normalize("BTC-USD", vec![candle(0, 100.0)]).unwrap();
        assert!(!series.is_stale(ts(30), TimeDelta::minutes(30)));
        assert!(series.is_stale(ts(31), TimeDelta::minutes(30)));
    }

    #[test]
    fn latest_returns_newest_bar() {
        let series =
            PriceSeries::normalize("BTC-USD", vec![candle(2, 102.0), candle(1, 101.0)]).unwrap();
        assert_eq!(series.latest().unwrap().close, 102.0);
    }
}
