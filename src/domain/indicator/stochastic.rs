//! Stochastic oscillator: %K over the trailing high/low range, %D as an
//! SMA of %K.

use super::sma::sma;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticPoint {
    pub k: f64,
    pub d: f64,
}

/// Stochastic(%K window, %D window) over aligned high/low/close slices.
/// %K is defined from index `k_window`; a full point needs the %D average
/// on top, so the first defined point is index `k_window + d_window`.
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_window: usize,
    d_window: usize,
) -> Vec<Option<StochasticPoint>> {
    let len = closes.len();
    if k_window == 0 || d_window == 0 || highs.len() != len || lows.len() != len {
        return vec![None; len];
    }

    let k_values: Vec<Option<f64>> = (0..len)
        .map(|i| {
            if i < k_window {
                return None;
            }
            let range = i - k_window..=i;
            let highest = highs[range.clone()].iter().copied().fold(f64::MIN, f64::max);
            let lowest = lows[range].iter().copied().fold(f64::MAX, f64::min);
            if highest == lowest {
                // flat range: no meaningful location within it
                Some(50.0)
            } else {
                Some((closes[i] - lowest) / (highest - lowest) * 100.0)
            }
        })
        .collect();

    let defined: Vec<f64> = k_values.iter().flatten().copied().collect();
    let d_values = sma(&defined, d_window);

    let mut out = vec![None; len];
    for (j, d) in d_values.iter().enumerate() {
        if let Some(d) = d {
            let i = k_window + j;
            out[i] = Some(StochasticPoint {
                k: k_values[i].unwrap_or_default(),
                d: *d,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(closes: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
        (highs, lows)
    }

    #[test]
    fn stochastic_warmup_is_undefined() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 7) as f64).collect();
        let (highs, lows) = series(&closes);
        let out = stochastic(&highs, &lows, &closes, 14, 3);
        // first defined point: k_window + d_window = 17
        assert!(out[..17].iter().all(|v| v.is_none()));
        assert!(out[17..].iter().all(|v| v.is_some()));
    }

    #[test]
    fn stochastic_k_at_top_of_range() {
        let mut closes = vec![100.0; 20];
        closes.push(120.0);
        let highs: Vec<f64> = closes.clone();
        let lows = vec![100.0; 21];
        let out = stochastic(&highs, &lows, &closes, 14, 3);
        let point = out.last().unwrap().unwrap();
        assert_relative_eq!(point.k, 100.0);
    }

    #[test]
    fn stochastic_flat_range_is_neutral() {
        let closes = vec![50.0; 30];
        let out = stochastic(&closes, &closes, &closes, 14, 3);
        let point = out.last().unwrap().unwrap();
        assert_relative_eq!(point.k, 50.0);
        assert_relative_eq!(point.d, 50.0);
    }

    #[test]
    fn stochastic_stays_in_range() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 1.1).sin() * 4.0)
            .collect();
        let (highs, lows) = series(&closes);
        for point in stochastic(&highs, &lows, &closes, 14, 3).iter().flatten() {
            assert!((0.0..=100.0).contains(&point.k));
            assert!((0.0..=100.0).contains(&point.d));
        }
    }

    #[test]
    fn stochastic_mismatched_lengths_all_undefined() {
        let closes = vec![1.0; 30];
        let short = vec![1.0; 29];
        assert!(
            stochastic(&short, &closes, &closes, 14, 3)
                .iter()
                .all(|v| v.is_none())
        );
    }
}
