//! MACD: EMA(fast) - EMA(slow), its EMA-smoothed signal line, and the
//! line/signal difference as a histogram.

use super::ema::ema;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD(fast, slow, signal). The line is defined once the slow EMA is
/// (index `slow`); a full point needs the signal EMA on top of that, so the
/// first defined point is index `slow + signal_window`.
pub fn macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal_window: usize,
) -> Vec<Option<MacdPoint>> {
    if fast == 0 || slow == 0 || signal_window == 0 || fast >= slow {
        return vec![None; values.len()];
    }

    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // signal line is an EMA over the defined stretch of the MACD line,
    // which starts at index `slow`
    let defined: Vec<f64> = line.iter().flatten().copied().collect();
    let signal = ema(&defined, signal_window);

    let mut out = vec![None; values.len()];
    for (j, sig) in signal.iter().enumerate() {
        if let Some(sig) = sig {
            let i = slow + j;
            let line_value = line[i].unwrap_or_default();
            out[i] = Some(MacdPoint {
                line: line_value,
                signal: *sig,
                histogram: line_value - *sig,
            });
        }
    }

    out
}
