//! Ledger persistence port trait.

use crate::domain::error::CoinledgerError;
use crate::domain::portfolio::Portfolio;
use crate::domain::position::Position;
use crate::domain::transaction::Transaction;

/// One portfolio's persisted state, as loaded at startup.
#[derive(Debug, Clone)]
pub struct BookRecord {
    pub portfolio: Portfolio,
    pub positions: Vec<Position>,
    pub transactions: Vec<Transaction>,
}

/// Durable storage behind the ledger. Implementations must make
/// `record_trade` atomic: the portfolio update, position upsert, and
/// transaction append land together or not at all.
pub trait LedgerStorePort: Send + Sync {
    fn create_portfolio(&self, portfolio: &Portfolio) -> Result<(), CoinledgerError>;

    fn record_trade(
        &self,
        portfolio: &Portfolio,
        position: &Position,
        transaction: &Transaction,
    ) -> Result<(), CoinledgerError>;

    fn record_valuation(
        &self,
        portfolio: &Portfolio,
        positions: &[Position],
    ) -> Result<(), CoinledgerError>;

    fn load_books(&self) -> Result<Vec<BookRecord>, CoinledgerError>;
}
