//! Technical indicator library.
//!
//! Every indicator is a pure, stateless function over a numeric slice and
//! returns one output per input bar. Outputs are `Option`-wrapped: `None`
//! means the indicator is undefined at that bar (insufficient lookback),
//! never a silent zero. Each indicator needs `window + 1` points before its
//! first defined value, so index `window` is the first `Some`.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;

pub use bollinger::{BollingerPoint, bollinger};
pub use ema::ema;
pub use macd::{MacdPoint, macd};
pub use rsi::rsi;
pub use sma::sma;
pub use stochastic::{StochasticPoint, stochastic};

/// Latest defined value of an indicator series, if any.
pub fn latest<T: Copy>(series: &[Option<T>]) -> Option<T> {
    series.last().copied().flatten()
}
