//! Relative Strength Index with Wilder smoothing.
//!
//! First average gain/loss is a simple mean over the first `window` price
//! changes; afterwards `avg = (prev_avg * (window - 1) + current) / window`.
//! `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`.
//!
//! Degenerate cases are defined explicitly so the ratio never divides by
//! zero: all-flat input (zero gain and zero loss) reads as neutral 50,
//! zero loss with positive gain reads as 100.

/// RSI over `window` price changes. Defined from index `window` onward.
pub fn rsi(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 || values.len() <= window {
        return vec![None; values.len()];
    }

    let mut out = vec![None; values.len()];

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = changes[..window].iter().copied().map(gain).sum::<f64>() / window as f64;
    let mut avg_loss = changes[..window].iter().copied().map(loss).sum::<f64>() / window as f64;
    out[window] = Some(rsi_value(avg_gain, avg_loss));

    for i in window + 1..values.len() {
        let change = changes[i - 1];
        avg_gain = (avg_gain * (window - 1) as f64 + gain(change)) / window as f64;
        avg_loss = (avg_loss * (window - 1) as f64 + loss(change)) / window as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            // no movement at all: neutral, not overbought
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rsi_warmup_is_undefined() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + (i % 5) as f64).collect();
        let out = rsi(&values, 14);
        assert!(out[..14].iter().all(|v| v.is_none()));
        assert!(out[14..].iter().all(|v| v.is_some()));
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let values: Vec<f64> = (0..16).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&values, 14);
        assert_relative_eq!(out[14].unwrap(), 100.0);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let values: Vec<f64> = (0..16).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&values, 14);
        assert_relative_eq!(out[14].unwrap(), 0.0);
    }

    #[test]
    fn rsi_flat_series_is_neutral_not_overbought() {
        let values = vec![42.0; 60];
        let out = rsi(&values, 14);
        for v in out[14..].iter() {
            assert_relative_eq!(v.unwrap(), 50.0);
        }
    }

    #[test]
    fn rsi_stays_in_range() {
        let values: Vec<f64> = (0..80)
            .map(|i| 100.0 + (i as f64 * 0.9).sin() * 7.0)
            .collect();
        for v in rsi(&values, 14).iter().flatten() {
            assert!((0.0..=100.0).contains(v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_short_series_all_undefined() {
        let values = vec![1.0; 14];
        assert!(rsi(&values, 14).iter().all(|v| v.is_none()));
    }

    #[test]
    fn rsi_bullish_bias_above_50() {
        // mostly rising closes should sit above the midline
        let values = vec![
            44.0, 44.25, 44.5, 43.75, 44.5, 44.25, 44.75, 45.25, 45.5, 45.25, 45.5, 46.0, 46.25,
            46.0, 46.5,
        ];
        let out = rsi(&values, 14);
        let last = out[14].unwrap();
        assert!(last > 50.0 && last < 100.0, "got {last}");
    }
}
