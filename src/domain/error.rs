//! Error taxonomy for the decision engine and ledger.
//!
//! Business-condition failures (risk limits, insufficient funds or position)
//! carry structured reasons; infrastructure failures (database, persistence)
//! carry an opaque message and are retryable. A rejected commit never mutates
//! ledger state.

use rust_decimal::Decimal;

/// Top-level error type for coinledger.
#[derive(Debug, thiserror::Error)]
pub enum CoinledgerError {
    #[error("invalid trade: {reason}")]
    Validation { reason: String },

    #[error("risk limits violated: {}", violations.join("; "))]
    RiskLimit { violations: Vec<String> },

    #[error("insufficient funds: need {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient position in {symbol}: requested {requested}, held {held}")]
    InsufficientPosition {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },

    #[error("no open position in {symbol}")]
    NoOpenPosition { symbol: String },

    #[error("concurrent modification: {reason}")]
    Conflict { reason: String },

    #[error("unknown portfolio {id}")]
    UnknownPortfolio { id: u64 },

    #[error("persistence failure: {reason}")]
    Persistence { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("market data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoinledgerError {
    /// Whether retrying the same call can succeed without the caller
    /// changing anything. True only for infrastructure failures and
    /// commit-time conflicts.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoinledgerError::Conflict { .. }
                | CoinledgerError::Persistence { .. }
                | CoinledgerError::Database { .. }
                | CoinledgerError::DatabaseQuery { .. }
        )
    }
}

impl From<&CoinledgerError> for std::process::ExitCode {
    fn from(err: &CoinledgerError) -> Self {
        let code: u8 = match err {
            CoinledgerError::Io(_) => 1,
            CoinledgerError::ConfigParse { .. }
            | CoinledgerError::ConfigMissing { .. }
            | CoinledgerError::ConfigInvalid { .. } => 2,
            CoinledgerError::Database { .. }
            | CoinledgerError::DatabaseQuery { .. }
            | CoinledgerError::Persistence { .. } => 3,
            CoinledgerError::Validation { .. } => 4,
            CoinledgerError::RiskLimit { .. }
            | CoinledgerError::InsufficientFunds { .. }
            | CoinledgerError::InsufficientPosition { .. }
            | CoinledgerError::NoOpenPosition { .. } => 5,
            CoinledgerError::Conflict { .. } | CoinledgerError::UnknownPortfolio { .. } => 6,
            CoinledgerError::Data { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_funds_message() {
        let err = CoinledgerError::InsufficientFunds {
            required: dec!(20000),
            available: dec!(10000),
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: need 20000, available 10000"
        );
    }

    #[test]
    fn risk_limit_joins_violations() {
        let err = CoinledgerError::RiskLimit {
            violations: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "risk limits violated: a; b");
    }

    #[test]
    fn retryable_classification() {
        assert!(
            CoinledgerError::Conflict {
                reason: "version".into()
            }
            .is_retryable()
        );
        assert!(
            CoinledgerError::Persistence {
                reason: "disk".into()
            }
            .is_retryable()
        );
        assert!(
            !CoinledgerError::InsufficientFunds {
                required: dec!(1),
                available: dec!(0),
            }
            .is_retryable()
        );
        assert!(
            !CoinledgerError::Validation {
                reason: "negative quantity".into()
            }
            .is_retryable()
        );
    }
}
