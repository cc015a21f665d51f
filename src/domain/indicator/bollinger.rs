//! Bollinger bands: SMA(window) ± k * population stddev.

use super::sma::sma;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerPoint {
    /// Zero-width bands (flat window) carry no mean-reversion information.
    pub fn is_degenerate(&self) -> bool {
        self.upper == self.lower
    }
}

/// Bollinger bands over `window` with multiplier `k`. Defined from index
/// `window` onward.
pub fn bollinger(values: &[f64], window: usize, k: f64) -> Vec<Option<BollingerPoint>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    let middle = sma(values, window);
    middle
        .iter()
        .enumerate()
        .map(|(i, mid)| {
            mid.map(|mid| {
                let slice = &values[i + 1 - window..=i];
                let variance =
                    slice.iter().map(|v| (v - mid).powi(2)).sum::<f64>() / window as f64;
                let offset = k * variance.sqrt();
                BollingerPoint {
                    upper: mid + offset,
                    middle: mid,
                    lower: mid - offset,
                }
            })
        })
        .collect()
}
