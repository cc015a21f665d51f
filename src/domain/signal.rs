//! Trading signal output type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
            SignalType::Hold => write!(f, "HOLD"),
        }
    }
}

/// One scored recommendation for one symbol. Never mutated after creation;
/// the metadata map carries per-rule scores and any degradation detail for
/// audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: String,
    pub signal_type: SignalType,
    /// Combined score of the winning bucket, in [0, 1], rounded to 3 dp.
    pub confidence: f64,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn signal_type_display() {
        assert_eq!(SignalType::Buy.to_string(), "BUY");
        assert_eq!(SignalType::Sell.to_string(), "SELL");
        assert_eq!(SignalType::Hold.to_string(), "HOLD");
    }

    #[test]
    fn signal_round_trips_through_json() {
        let signal = TradingSignal {
            symbol: "BTC-USD".into(),
            signal_type: SignalType::Buy,
            confidence: 0.625,
            reasoning: "RSI 28.3 oversold".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            metadata: BTreeMap::from([(
                "momentum".to_string(),
                serde_json::json!({"confidence": 0.8}),
            )]),
        };
        let json = serde_json::to_string(&signal).unwrap();
        let back: TradingSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signal);
    }
}
