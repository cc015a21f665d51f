//! Monetary rounding policy.
//!
//! All in-memory arithmetic keeps rust_decimal's full precision; values are
//! rounded only at output boundaries (snapshots, persistence) to 8
//! fractional digits, round-half-up.

use rust_decimal::{Decimal, RoundingStrategy};

pub const MONEY_SCALE: u32 = 8;

pub fn round8(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
