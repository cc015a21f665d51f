//! Portfolio aggregate: cash, risk limits, and derived valuation totals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::round8;
use super::position::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: u64,
    pub cash_balance: Decimal,
    /// `cash_balance + sum of open position current_value`; maintained by
    /// [`Portfolio::recompute`].
    pub total_value: Decimal,
    pub invested_amount: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub max_position_limit: Decimal,
    pub daily_loss_limit: Decimal,
    pub current_daily_loss: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn new(
        id: u64,
        initial_cash: Decimal,
        max_position_limit: Decimal,
        daily_loss_limit: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Portfolio {
            id,
            cash_balance: initial_cash,
            total_value: initial_cash,
            invested_amount: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            max_position_limit,
            daily_loss_limit,
            current_daily_loss: Decimal::ZERO,
            created_at: at,
        }
    }

    /// Cash not earmarked by reservations on open positions. The spendable
    /// ceiling for buys; must never go negative.
    pub fn available_balance(&self, positions: &[Position]) -> Decimal {
        let reserved: Decimal = positions
            .iter()
            .filter(|p| p.is_open())
            .map(|p| p.reserved_amount)
            .sum();
        self.cash_balance - reserved
    }

    /// Rebuild the derived aggregates from the open positions.
    pub fn recompute(&mut self, positions: &[Position]) {
        let open = positions.iter().filter(|p| p.is_open());
        let mut invested = Decimal::ZERO;
        let mut value = Decimal::ZERO;
        let mut unrealized = Decimal::ZERO;
        for position in open {
            invested += position.invested_amount;
            value += position.current_value;
            unrealized += position.unrealized_pnl;
        }
        self.invested_amount = invested;
        self.unrealized_pnl = unrealized;
        self.total_value = self.cash_balance + value;
    }

    /// Copy with monetary fields rounded for output.
    pub fn rounded(&self) -> Self {
        Portfolio {
            cash_balance: round8(self.cash_balance),
            total_value: round8(self.total_value),
            invested_amount: round8(self.invested_amount),
            realized_pnl: round8(self.realized_pnl),
            unrealized_pnl: round8(self.unrealized_pnl),
            max_position_limit: round8(self.max_position_limit),
            daily_loss_limit: round8(self.daily_loss_limit),
            current_daily_loss: round8(self.current_daily_loss),
            ..self.clone()
        }
    }
}
