//! Market data access port trait.

use crate::domain::candle::PriceSeries;
use crate::domain::error::CoinledgerError;

pub trait MarketDataPort {
    /// Candles for one symbol, normalized (sorted ascending, no duplicate
    /// timestamps).
    fn fetch_candles(&self, symbol: &str) -> Result<PriceSeries, CoinledgerError>;

    /// Symbols this source can serve.
    fn list_symbols(&self) -> Result<Vec<String>, CoinledgerError>;
}
