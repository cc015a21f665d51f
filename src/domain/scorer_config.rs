//! Scorer configuration: rule weights and thresholds.
//!
//! Weights are loaded once at startup from the `[signals]` config section
//! and validated as a whole; unknown keys in the section are rejected so a
//! typoed rule name fails loudly instead of silently using a default.

use crate::domain::error::CoinledgerError;
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "signals";

const KNOWN_KEYS: &[&str] = &[
    "low_confidence_threshold",
    "min_history",
    "trend_weight",
    "momentum_weight",
    "momentum_hold_weight",
    "macd_weight",
    "mean_reversion_weight",
    "volume_boost",
    "volume_ratio",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    /// Winning scores below this emit HOLD with reason "no clear signal".
    pub low_confidence_threshold: f64,
    /// Minimum candles required before scoring at all.
    pub min_history: usize,
    pub trend_weight: f64,
    pub momentum_weight: f64,
    /// Weight of the neutral-RSI hold vote (40..=60 band).
    pub momentum_hold_weight: f64,
    pub macd_weight: f64,
    pub mean_reversion_weight: f64,
    /// Confidence boost applied to directional votes on high volume.
    pub volume_boost: f64,
    /// Volume must exceed `volume_ratio` x its 20-period average to confirm.
    pub volume_ratio: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        ScorerConfig {
            low_confidence_threshold: 0.30,
            min_history: 50,
            trend_weight: 0.20,
            momentum_weight: 0.25,
            momentum_hold_weight: 0.10,
            macd_weight: 0.20,
            mean_reversion_weight: 0.15,
            volume_boost: 0.10,
            volume_ratio: 1.5,
        }
    }
}

impl ScorerConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CoinledgerError> {
        for key in config.keys(SECTION) {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                return Err(CoinledgerError::ConfigInvalid {
                    section: SECTION.into(),
                    key: key.clone(),
                    reason: "unknown signal scorer key".into(),
                });
            }
        }

        let defaults = ScorerConfig::default();
        let cfg = ScorerConfig {
            low_confidence_threshold: config.get_double(
                SECTION,
                "low_confidence_threshold",
                defaults.low_confidence_threshold,
            ),
            min_history: config.get_int(SECTION, "min_history", defaults.min_history as i64)
                as usize,
            trend_weight: config.get_double(SECTION, "trend_weight", defaults.trend_weight),
            momentum_weight: config.get_double(
                SECTION,
                "momentum_weight",
                defaults.momentum_weight,
            ),
            momentum_hold_weight: config.get_double(
                SECTION,
                "momentum_hold_weight",
                defaults.momentum_hold_weight,
            ),
            macd_weight: config.get_double(SECTION, "macd_weight", defaults.macd_weight),
            mean_reversion_weight: config.get_double(
                SECTION,
                "mean_reversion_weight",
                defaults.mean_reversion_weight,
            ),
            volume_boost: config.get_double(SECTION, "volume_boost", defaults.volume_boost),
            volume_ratio: config.get_double(SECTION, "volume_ratio", defaults.volume_ratio),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CoinledgerError> {
        let unit_interval = [
            ("low_confidence_threshold", self.low_confidence_threshold),
            ("trend_weight", self.trend_weight),
            ("momentum_weight", self.momentum_weight),
            ("momentum_hold_weight", self.momentum_hold_weight),
            ("macd_weight", self.macd_weight),
            ("mean_reversion_weight", self.mean_reversion_weight),
            ("volume_boost", self.volume_boost),
        ];
        for (key, value) in unit_interval {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoinledgerError::ConfigInvalid {
                    section: SECTION.into(),
                    key: key.into(),
                    reason: format!("{value} outside [0, 1]"),
                });
            }
        }
        if self.volume_ratio <= 0.0 {
            return Err(CoinledgerError::ConfigInvalid {
                section: SECTION.into(),
                key: "volume_ratio".into(),
                reason: "must be positive".into(),
            });
        }
        if self.min_history < 2 {
            return Err(CoinledgerError::ConfigInvalid {
                section: SECTION.into(),
                key: "min_history".into(),
                reason: "must be at least 2".into(),
            });
        }
        Ok(())
    }
}
