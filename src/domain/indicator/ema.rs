//! Exponential moving average.

/// EMA with smoothing `alpha = 2 / (window + 1)`, seeded with the simple
/// mean of the first `window` values. Defined from index `window` onward.
pub fn ema(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 || values.len() <= window {
        return vec![None; values.len()];
    }

    let alpha = 2.0 / (window as f64 + 1.0);
    let mut out = vec![None; values.len()];

    let mut current = values[..window].iter().sum::<f64>() / window as f64;
    for (i, &value) in values.iter().enumerate().skip(window) {
        current = alpha * value + (1.0 - alpha) * current;
        out[i] = Some(current);
    }

    out
}
