//! Position records: one open or closed holding of one symbol.
//!
//! A position is created on the first buy of a symbol, mutated by later
//! buys and sells, and closed when quantity reaches zero. A re-buy after
//! close opens a fresh record rather than reusing the closed one, so each
//! record describes exactly one open interval.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::round8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub portfolio_id: u64,
    pub symbol: String,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub current_price: Decimal,
    pub invested_amount: Decimal,
    pub current_value: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    /// Cash earmarked by in-flight orders against this symbol; excluded
    /// from the portfolio's available balance.
    pub reserved_amount: Decimal,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn open(
        id: u64,
        portfolio_id: u64,
        symbol: impl Into<String>,
        quantity: Decimal,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        let invested = quantity * price;
        Position {
            id,
            portfolio_id,
            symbol: symbol.into(),
            quantity,
            average_price: price,
            current_price: price,
            invested_amount: invested,
            current_value: invested,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            reserved_amount: Decimal::ZERO,
            status: PositionStatus::Open,
            opened_at: at,
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Fold a fill into the position: streaming average-price update,
    /// quantity and invested amount grow by the fill.
    pub fn apply_buy(&mut self, quantity: Decimal, price: Decimal) {
        let total = quantity * price;
        self.average_price = (self.quantity * self.average_price + total)
            / (self.quantity + quantity);
        self.quantity += quantity;
        self.invested_amount += total;
        self.revalue(price);
    }

    /// Reduce the position by a sell fill. Cost basis is released
    /// proportionally to the quantity sold; the excess of proceeds over
    /// that basis is the realized P&L delta, which is returned.
    pub fn apply_sell(
        &mut self,
        quantity: Decimal,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Decimal {
        let proceeds = quantity * price;
        let cost_basis = quantity / self.quantity * self.invested_amount;
        let realized_delta = proceeds - cost_basis;

        self.quantity -= quantity;
        self.invested_amount -= cost_basis;
        self.realized_pnl += realized_delta;

        if self.quantity.is_zero() {
            self.status = PositionStatus::Closed;
            self.closed_at = Some(at);
            self.current_price = price;
            self.current_value = Decimal::ZERO;
            self.unrealized_pnl = Decimal::ZERO;
            self.invested_amount = Decimal::ZERO;
        } else {
            self.revalue(price);
        }
        realized_delta
    }

    /// Refresh valuation at a new market price. Never touches quantity or
    /// cost basis.
    pub fn revalue(&mut self, price: Decimal) {
        self.current_price = price;
        self.current_value = self.quantity * price;
        self.unrealized_pnl = self.current_value - self.invested_amount;
    }

    /// Copy with monetary fields rounded for output.
    pub fn rounded(&self) -> Self {
        Position {
            quantity: round8(self.quantity),
            average_price: round8(self.average_price),
            current_price: round8(self.current_price),
            invested_amount: round8(self.invested_amount),
            current_value: round8(self.current_value),
            realized_pnl: round8(self.realized_pnl),
            unrealized_pnl: round8(self.unrealized_pnl),
            reserved_amount: round8(self.reserved_amount),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn sample() -> Position {
        Position::open(1, 1, "BTC-USD", dec!(0.4), dec!(20000), at())
    }

    #[test]
    fn open_position_invests_quantity_times_price() {
        let pos = sample();
        assert_eq!(pos.invested_amount, dec!(8000));
        assert_eq!(pos.current_value, dec!(8000));
        assert_eq!(pos.unrealized_pnl, dec!(0));
        assert!(pos.is_open());
    }

    #[test]
    fn buy_updates_average_price() {
        let mut pos = sample();
        pos.apply_buy(dec!(0.1), dec!(22000));
        // (0.4*20000 + 0.1*22000) / 0.5 = 20400
        assert_eq!(pos.average_price, dec!(20400));
        assert_eq!(pos.quantity, dec!(0.5));
        assert_eq!(pos.invested_amount, dec!(10200));
    }

    #[test]
    fn full_sell_closes_and_realizes() {
        let mut pos = sample();
        let delta = pos.apply_sell(dec!(0.4), dec!(25000), at());
        assert_eq!(delta, dec!(2000));
        assert_eq!(pos.quantity, dec!(0));
        assert_eq!(pos.status, PositionStatus::Closed);
        assert_eq!(pos.invested_amount, dec!(0));
        assert_eq!(pos.unrealized_pnl, dec!(0));
        assert_eq!(pos.realized_pnl, dec!(2000));
        assert!(pos.closed_at.is_some());
    }

    #[test]
    fn partial_sell_releases_proportional_basis() {
        let mut pos = sample();
        let delta = pos.apply_sell(dec!(0.2), dec!(25000), at());
        // basis released: 0.2/0.4 * 8000 = 4000; proceeds 5000
        assert_eq!(delta, dec!(1000));
        assert_eq!(pos.quantity, dec!(0.2));
        assert_eq!(pos.invested_amount, dec!(4000));
        assert!(pos.is_open());
    }

    #[test]
    fn partial_sell_at_loss_is_negative_delta() {
        let mut pos = sample();
        let delta = pos.apply_sell(dec!(0.2), dec!(15000), at());
        // proceeds 3000 against basis 4000
        assert_eq!(delta, dec!(-1000));
    }

    #[test]
    fn revalue_tracks_market_price() {
        let mut pos = sample();
        pos.revalue(dec!(21000));
        assert_eq!(pos.current_value, dec!(8400));
        assert_eq!(pos.unrealized_pnl, dec!(400));
        // cost basis untouched
        assert_eq!(pos.invested_amount, dec!(8000));
    }

    proptest! {
        /// The streaming average-price update agrees with recomputing the
        /// average from the full fill history, for any fill sequence.
        #[test]
        fn incremental_average_matches_full_replay(
            fills in prop::collection::vec((1u32..10_000, 1u32..1_000_000), 1..20)
        ) {
            // quantities in hundredths, prices in tenths
            let to_qty = |q: u32| Decimal::from(q) / dec!(100);
            let to_price = |p: u32| Decimal::from(p) / dec!(10);

            let (q0, p0) = fills[0];
            let mut pos = Position::open(1, 1, "ETH-USD", to_qty(q0), to_price(p0), at());
            for &(q, p) in &fills[1..] {
                pos.apply_buy(to_qty(q), to_price(p));
            }

            let total_qty: Decimal = fills.iter().map(|&(q, _)| to_qty(q)).sum();
            let total_cost: Decimal =
                fills.iter().map(|&(q, p)| to_qty(q) * to_price(p)).sum();
            prop_assert_eq!(pos.quantity, total_qty);
            prop_assert_eq!(pos.invested_amount, total_cost);
            prop_assert_eq!(round8(pos.average_price), round8(total_cost / total_qty));
        }
    }
}
