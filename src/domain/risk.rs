//! Risk gate: pure pre-trade predicates over a ledger snapshot and a
//! proposed trade. Invoked by both quote and commit; has no side effects.

use rust_decimal::Decimal;
use std::fmt;

use super::portfolio::Portfolio;
use super::position::Position;
use super::transaction::{Side, TradeIntent};

#[derive(Debug, Clone, PartialEq)]
pub enum RiskViolation {
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },
    ExceedsPositionLimit {
        total: Decimal,
        limit: Decimal,
    },
    ExceedsDailyLossLimit {
        projected: Decimal,
        limit: Decimal,
    },
    NoOpenPosition {
        symbol: String,
    },
    InsufficientPosition {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },
}

impl fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskViolation::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "insufficient funds: need {required}, available {available}"
            ),
            RiskViolation::ExceedsPositionLimit { total, limit } => {
                write!(f, "trade total {total} exceeds position limit {limit}")
            }
            RiskViolation::ExceedsDailyLossLimit { projected, limit } => {
                write!(
                    f,
                    "projected daily exposure {projected} exceeds loss limit {limit}"
                )
            }
            RiskViolation::NoOpenPosition { symbol } => {
                write!(f, "no open position in {symbol}")
            }
            RiskViolation::InsufficientPosition {
                symbol,
                requested,
                held,
            } => write!(
                f,
                "insufficient position in {symbol}: requested {requested}, held {held}"
            ),
        }
    }
}

/// Evaluate every applicable check; all violations are reported, not just
/// the first.
pub fn evaluate(
    portfolio: &Portfolio,
    positions: &[Position],
    intent: &TradeIntent,
) -> Vec<RiskViolation> {
    let mut violations = Vec::new();
    let total = intent.total_amount();

    match intent.side {
        Side::Buy => {
            let required = total + intent.fee;
            let available = portfolio.available_balance(positions);
            if required > available {
                violations.push(RiskViolation::InsufficientFunds {
                    required,
                    available,
                });
            }
            if total > portfolio.max_position_limit {
                violations.push(RiskViolation::ExceedsPositionLimit {
                    total,
                    limit: portfolio.max_position_limit,
                });
            }
            let projected = portfolio.current_daily_loss + total;
            if projected > portfolio.daily_loss_limit {
                violations.push(RiskViolation::ExceedsDailyLossLimit {
                    projected,
                    limit: portfolio.daily_loss_limit,
                });
            }
        }
        Side::Sell => {
            // proceeds are total - fee; cash may not go negative covering it
            let covering = total + portfolio.available_balance(positions);
            if intent.fee > covering {
                violations.push(RiskViolation::InsufficientFunds {
                    required: intent.fee,
                    available: covering,
                });
            }
            match positions
                .iter()
                .find(|p| p.is_open() && p.symbol == intent.symbol)
            {
                None => violations.push(RiskViolation::NoOpenPosition {
                    symbol: intent.symbol.clone(),
                }),
                Some(position) if intent.quantity > position.quantity => {
                    violations.push(RiskViolation::InsufficientPosition {
                        symbol: intent.symbol.clone(),
                        requested: intent.quantity,
                        held: position.quantity,
                    });
                }
                Some(_) => {}
            }
        }
    }

    violations
}
