//! Signal scorer: a fixed rule set over indicator outputs, combined into
//! one weighted BUY/SELL/HOLD recommendation per symbol.
//!
//! Scoring is deterministic and total: the same series always yields the
//! same signal, and no input ever raises into the caller. Thin history and
//! broken input degrade to HOLD with the cause recorded in metadata.

use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::candle::PriceSeries;
use super::indicator::{bollinger, latest, macd, rsi, sma};
use super::scorer_config::ScorerConfig;
use super::signal::{SignalType, TradingSignal};

const SMA_SHORT: usize = 20;
const SMA_LONG: usize = 50;
const RSI_WINDOW: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const BOLLINGER_WINDOW: usize = 20;
const BOLLINGER_K: f64 = 2.0;
const VOLUME_WINDOW: usize = 20;

/// Maximum confidence a volume-confirmed vote can reach.
const CONFIDENCE_CAP: f64 = 0.95;

#[derive(Debug, Clone)]
struct RuleVote {
    rule: &'static str,
    direction: SignalType,
    confidence: f64,
    weight: f64,
    reason: String,
}

pub struct Scorer {
    config: ScorerConfig,
}

impl Scorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Score one symbol's series. Infallible by design: indicator trouble
    /// becomes a zero-confidence HOLD with the error in metadata.
    pub fn score(&self, series: &PriceSeries) -> TradingSignal {
        match self.evaluate(series) {
            Ok(signal) => signal,
            Err(reason) => {
                warn!(symbol = series.symbol(), %reason, "signal degraded to HOLD");
                let mut metadata = BTreeMap::new();
                metadata.insert("error".to_string(), json!(reason));
                self.hold(series, 0.0, "indicator error", metadata)
            }
        }
    }

    fn evaluate(&self, series: &PriceSeries) -> Result<TradingSignal, String> {
        if series.len() < self.config.min_history {
            let mut metadata = BTreeMap::new();
            metadata.insert("history".to_string(), json!(series.len()));
            metadata.insert("required".to_string(), json!(self.config.min_history));
            return Ok(self.hold(series, 0.0, "insufficient data", metadata));
        }

        let closes = series.closes();
        let volumes = series.volumes();
        if closes.iter().chain(volumes.iter()).any(|v| !v.is_finite()) {
            return Err("non-finite value in price series".into());
        }

        let close = *closes.last().expect("non-empty by min_history");
        let mut votes = self.collect_votes(close, &closes);
        let volume_confirmed = self.apply_volume_confirmation(&mut votes, &volumes);

        let mut metadata: BTreeMap<String, serde_json::Value> = votes
            .iter()
            .map(|v| {
                (
                    v.rule.to_string(),
                    json!({
                        "direction": v.direction.to_string(),
                        "confidence": round3(v.confidence),
                        "weight": v.weight,
                        "reason": v.reason,
                    }),
                )
            })
            .collect();
        metadata.insert("volume_confirmed".to_string(), json!(volume_confirmed));

        if votes.is_empty() {
            return Ok(self.hold(series, 0.0, "no clear signal", metadata));
        }

        let total_weight: f64 = votes.iter().map(|v| v.weight).sum();
        let mut scores = [0.0f64; 3]; // buy, sell, hold
        for vote in &votes {
            let idx = match vote.direction {
                SignalType::Buy => 0,
                SignalType::Sell => 1,
                SignalType::Hold => 2,
            };
            scores[idx] += vote.weight / total_weight * vote.confidence;
        }
        let [buy_score, sell_score, hold_score] = scores;
        metadata.insert("buy_score".to_string(), json!(round3(buy_score)));
        metadata.insert("sell_score".to_string(), json!(round3(sell_score)));
        metadata.insert("hold_score".to_string(), json!(round3(hold_score)));

        // ties resolve BUY > SELL > HOLD
        let (winner, winning_score) = [
            (SignalType::Buy, buy_score),
            (SignalType::Sell, sell_score),
            (SignalType::Hold, hold_score),
        ]
        .into_iter()
        .reduce(|best, cand| if cand.1 > best.1 { cand } else { best })
        .expect("three buckets");

        if winning_score < self.config.low_confidence_threshold {
            return Ok(self.hold(series, round3(hold_score), "no clear signal", metadata));
        }

        let reasoning = votes
            .iter()
            .filter(|v| v.direction == winner)
            .map(|v| v.reason.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        debug!(
            symbol = series.symbol(),
            signal = %winner,
            confidence = round3(winning_score),
            "signal scored"
        );

        Ok(TradingSignal {
            symbol: series.symbol().to_string(),
            signal_type: winner,
            confidence: round3(winning_score),
            reasoning,
            timestamp: self.timestamp(series),
            metadata,
        })
    }

    fn collect_votes(&self, close: f64, closes: &[f64]) -> Vec<RuleVote> {
        let mut votes = Vec::new();

        let sma_short = latest(&sma(closes, SMA_SHORT));
        let sma_long = latest(&sma(closes, SMA_LONG));
        if let (Some(short), Some(long)) = (sma_short, sma_long) {
            if close > short && short > long {
                votes.push(RuleVote {
                    rule: "trend",
                    direction: SignalType::Buy,
                    confidence: 0.6,
                    weight: self.config.trend_weight,
                    reason: format!("uptrend: close {close:.2} above SMA20 above SMA50"),
                });
            } else if close < short && short < long {
                votes.push(RuleVote {
                    rule: "trend",
                    direction: SignalType::Sell,
                    confidence: 0.6,
                    weight: self.config.trend_weight,
                    reason: format!("downtrend: close {close:.2} below SMA20 below SMA50"),
                });
            }
        }

        if let Some(rsi_value) = latest(&rsi(closes, RSI_WINDOW)) {
            if rsi_value < 30.0 {
                votes.push(RuleVote {
                    rule: "momentum",
                    direction: SignalType::Buy,
                    confidence: 0.8,
                    weight: self.config.momentum_weight,
                    reason: format!("RSI {rsi_value:.1} oversold"),
                });
            } else if rsi_value > 70.0 {
                votes.push(RuleVote {
                    rule: "momentum",
                    direction: SignalType::Sell,
                    confidence: 0.8,
                    weight: self.config.momentum_weight,
                    reason: format!("RSI {rsi_value:.1} overbought"),
                });
            } else if (40.0..=60.0).contains(&rsi_value) {
                votes.push(RuleVote {
                    rule: "momentum",
                    direction: SignalType::Hold,
                    confidence: 0.5,
                    weight: self.config.momentum_hold_weight,
                    reason: format!("RSI {rsi_value:.1} neutral"),
                });
            }
        }

        if let Some(point) = latest(&macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)) {
            if point.line > point.signal && point.histogram > 0.0 {
                votes.push(RuleVote {
                    rule: "macd",
                    direction: SignalType::Buy,
                    confidence: 0.7,
                    weight: self.config.macd_weight,
                    reason: "MACD line above signal with positive histogram".to_string(),
                });
            } else if point.line < point.signal && point.histogram < 0.0 {
                votes.push(RuleVote {
                    rule: "macd",
                    direction: SignalType::Sell,
                    confidence: 0.7,
                    weight: self.config.macd_weight,
                    reason: "MACD line below signal with negative histogram".to_string(),
                });
            }
        }

        if let Some(bands) = latest(&bollinger(closes, BOLLINGER_WINDOW, BOLLINGER_K)) {
            // zero-width bands carry no mean-reversion information
            if !bands.is_degenerate() {
                if close <= bands.lower {
                    votes.push(RuleVote {
                        rule: "mean_reversion",
                        direction: SignalType::Buy,
                        confidence: 0.6,
                        weight: self.config.mean_reversion_weight,
                        reason: format!(
                            "close {close:.2} at/below lower Bollinger band {:.2}",
                            bands.lower
                        ),
                    });
                } else if close >= bands.upper {
                    votes.push(RuleVote {
                        rule: "mean_reversion",
                        direction: SignalType::Sell,
                        confidence: 0.6,
                        weight: self.config.mean_reversion_weight,
                        reason: format!(
                            "close {close:.2} at/above upper Bollinger band {:.2}",
                            bands.upper
                        ),
                    });
                }
            }
        }

        votes
    }

    /// High relative volume confirms conviction: every already-fired
    /// directional vote gets a capped confidence boost. Returns whether the
    /// confirmation triggered.
    fn apply_volume_confirmation(&self, votes: &mut [RuleVote], volumes: &[f64]) -> bool {
        let current = match volumes.last() {
            Some(&v) if v > 0.0 => v,
            _ => return false,
        };
        let average = match latest(&sma(volumes, VOLUME_WINDOW)) {
            Some(avg) if avg > 0.0 => avg,
            _ => return false,
        };
        if current <= self.config.volume_ratio * average {
            return false;
        }

        for vote in votes.iter_mut() {
            if matches!(vote.direction, SignalType::Buy | SignalType::Sell) {
                vote.confidence = (vote.confidence + self.config.volume_boost).min(CONFIDENCE_CAP);
            }
        }
        true
    }

    fn hold(
        &self,
        series: &PriceSeries,
        confidence: f64,
        reason: &str,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> TradingSignal {
        TradingSignal {
            symbol: series.symbol().to_string(),
            signal_type: SignalType::Hold,
            confidence,
            reasoning: reason.to_string(),
            timestamp: self.timestamp(series),
            metadata,
        }
    }

    // signals are stamped with the bar they were computed from, so repeated
    // scoring of the same series is byte-identical
    fn timestamp(&self, series: &PriceSeries) -> chrono::DateTime<chrono::Utc> {
        series
            .latest()
            .map(|c| c.timestamp)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
