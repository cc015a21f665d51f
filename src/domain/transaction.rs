//! Trade intents and the append-only transaction record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::CoinledgerError;
use super::money::round8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = CoinledgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(CoinledgerError::Validation {
                reason: format!("unknown side '{other}', expected buy or sell"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Completed,
}

/// A trade as reported filled by the exchange gateway. Quantity and price
/// are the actual fill values, which may differ from what any signal
/// suggested.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub order_ref: String,
    pub executed_at: DateTime<Utc>,
}

impl TradeIntent {
    /// Notional value of the fill, before fees.
    pub fn total_amount(&self) -> Decimal {
        self.quantity * self.price
    }

    /// Malformed-input rejection, before any risk evaluation.
    pub fn validate(&self) -> Result<(), CoinledgerError> {
        if self.symbol.trim().is_empty() {
            return Err(CoinledgerError::Validation {
                reason: "empty symbol".into(),
            });
        }
        if self.quantity <= Decimal::ZERO {
            return Err(CoinledgerError::Validation {
                reason: format!("quantity must be positive, got {}", self.quantity),
            });
        }
        if self.price <= Decimal::ZERO {
            return Err(CoinledgerError::Validation {
                reason: format!("price must be positive, got {}", self.price),
            });
        }
        if self.fee < Decimal::ZERO {
            return Err(CoinledgerError::Validation {
                reason: format!("fee must be non-negative, got {}", self.fee),
            });
        }
        Ok(())
    }
}

/// Immutable audit record, created exactly once per committed trade by the
/// ledger's commit path and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub portfolio_id: u64,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub fee: Decimal,
    /// Realized P&L delta; sells only.
    pub realized_pnl: Option<Decimal>,
    pub status: TransactionStatus,
    pub order_ref: String,
    pub executed_at: DateTime<Utc>,
}

impl Transaction {
    /// Copy with monetary fields rounded for output.
    pub fn rounded(&self) -> Self {
        Transaction {
            quantity: round8(self.quantity),
            price: round8(self.price),
            total_amount: round8(self.total_amount),
            fee: round8(self.fee),
            realized_pnl: self.realized_pnl.map(round8),
            ..self.clone()
        }
    }
}
