//! The portfolio ledger: authoritative account state behind per-portfolio
//! exclusive locks.
//!
//! Every mutating operation on one portfolio is serialized by that
//! portfolio's write lock; reads run freely concurrent under read locks.
//! `commit_trade` is one atomic unit: risk checks are re-run inside the
//! lock (a quote is advisory only), the mutation is applied to a working
//! copy, persisted, and only then published. A failing check or a store
//! error leaves the ledger bit-for-bit unchanged.

use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use crate::ports::store_port::LedgerStorePort;

use super::error::CoinledgerError;
use super::portfolio::Portfolio;
use super::position::Position;
use super::risk::{self, RiskViolation};
use super::transaction::{Side, TradeIntent, Transaction, TransactionStatus};

/// Read-only view of one portfolio, monetary fields rounded to 8 dp.
#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub portfolio: Portfolio,
    pub positions: Vec<Position>,
    /// Bumped once per committed trade; never by valuation refreshes.
    pub version: u64,
}

/// Advisory result of `quote_trade`. State may shift before a commit, so
/// the authoritative answer is always the commit itself.
#[derive(Debug, Clone)]
pub struct TradeQuote {
    pub allowed: bool,
    pub violations: Vec<String>,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct TradeReceipt {
    pub transaction: Transaction,
    pub cash_balance: Decimal,
    pub total_value: Decimal,
    pub version: u64,
}

#[derive(Debug, Clone)]
struct Book {
    portfolio: Portfolio,
    positions: Vec<Position>,
    transactions: Vec<Transaction>,
    version: u64,
    next_position_id: u64,
    next_transaction_id: u64,
}

impl Book {
    fn apply(&mut self, intent: &TradeIntent) -> Result<Transaction, CoinledgerError> {
        let total = intent.total_amount();
        let realized_pnl = match intent.side {
            Side::Buy => {
                self.portfolio.cash_balance -= total + intent.fee;
                match self
                    .positions
                    .iter_mut()
                    .find(|p| p.is_open() && p.symbol == intent.symbol)
                {
                    Some(position) => position.apply_buy(intent.quantity, intent.price),
                    None => {
                        // a re-buy after close opens a fresh record; one
                        // record per open interval keeps the audit trail flat
                        let id = self.next_position_id;
                        self.next_position_id += 1;
                        self.positions.push(Position::open(
                            id,
                            self.portfolio.id,
                            intent.symbol.clone(),
                            intent.quantity,
                            intent.price,
                            intent.executed_at,
                        ));
                    }
                }
                None
            }
            Side::Sell => {
                let position = self
                    .positions
                    .iter_mut()
                    .find(|p| p.is_open() && p.symbol == intent.symbol)
                    .ok_or_else(|| CoinledgerError::NoOpenPosition {
                        symbol: intent.symbol.clone(),
                    })?;
                let delta =
                    position.apply_sell(intent.quantity, intent.price, intent.executed_at);
                self.portfolio.cash_balance += total - intent.fee;
                self.portfolio.realized_pnl += delta;
                if delta < Decimal::ZERO {
                    self.portfolio.current_daily_loss -= delta;
                }
                Some(delta)
            }
        };
        self.portfolio.recompute(&self.positions);

        let id = self.next_transaction_id;
        self.next_transaction_id += 1;
        let transaction = Transaction {
            id,
            portfolio_id: self.portfolio.id,
            symbol: intent.symbol.clone(),
            side: intent.side,
            quantity: intent.quantity,
            price: intent.price,
            total_amount: total,
            fee: intent.fee,
            realized_pnl,
            status: TransactionStatus::Completed,
            order_ref: intent.order_ref.clone(),
            executed_at: intent.executed_at,
        };
        self.transactions.push(transaction.clone());
        self.version += 1;
        Ok(transaction)
    }

    /// Latest record for a symbol, open or just closed by this trade.
    fn latest_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().rev().find(|p| p.symbol == symbol)
    }
}

pub struct Ledger {
    books: DashMap<u64, Arc<RwLock<Book>>>,
    next_portfolio_id: AtomicU64,
    store: Option<Arc<dyn LedgerStorePort>>,
}

impl Ledger {
    /// In-memory ledger with no durable backing.
    pub fn new() -> Self {
        Ledger {
            books: DashMap::new(),
            next_portfolio_id: AtomicU64::new(1),
            store: None,
        }
    }

    /// Ledger backed by a durable store; existing portfolios are loaded.
    pub fn with_store(store: Arc<dyn LedgerStorePort>) -> Result<Self, CoinledgerError> {
        let records = store.load_books()?;
        let books = DashMap::new();
        let mut max_id = 0;
        for record in records {
            let id = record.portfolio.id;
            max_id = max_id.max(id);
            let next_position_id =
                record.positions.iter().map(|p| p.id + 1).max().unwrap_or(1);
            let next_transaction_id = record
                .transactions
                .iter()
                .map(|t| t.id + 1)
                .max()
                .unwrap_or(1);
            let version = record.transactions.len() as u64;
            books.insert(
                id,
                Arc::new(RwLock::new(Book {
                    portfolio: record.portfolio,
                    positions: record.positions,
                    transactions: record.transactions,
                    version,
                    next_position_id,
                    next_transaction_id,
                })),
            );
        }
        Ok(Ledger {
            books,
            next_portfolio_id: AtomicU64::new(max_id + 1),
            store: Some(store),
        })
    }

    pub fn create_portfolio(
        &self,
        initial_cash: Decimal,
        max_position_limit: Decimal,
        daily_loss_limit: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, CoinledgerError> {
        if initial_cash < Decimal::ZERO {
            return Err(CoinledgerError::Validation {
                reason: format!("initial cash must be non-negative, got {initial_cash}"),
            });
        }
        if max_position_limit <= Decimal::ZERO || daily_loss_limit <= Decimal::ZERO {
            return Err(CoinledgerError::Validation {
                reason: "risk limits must be positive".into(),
            });
        }

        let id = self.next_portfolio_id.fetch_add(1, Ordering::SeqCst);
        let portfolio = Portfolio::new(id, initial_cash, max_position_limit, daily_loss_limit, at);

        if let Some(store) = &self.store {
            store
                .create_portfolio(&portfolio.rounded())
                .map_err(|e| CoinledgerError::Persistence {
                    reason: e.to_string(),
                })?;
        }

        self.books.insert(
            id,
            Arc::new(RwLock::new(Book {
                portfolio,
                positions: Vec::new(),
                transactions: Vec::new(),
                version: 0,
                next_position_id: 1,
                next_transaction_id: 1,
            })),
        );
        info!(portfolio_id = id, %initial_cash, "portfolio created");
        Ok(id)
    }

    fn book(&self, portfolio_id: u64) -> Result<Arc<RwLock<Book>>, CoinledgerError> {
        self.books
            .get(&portfolio_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(CoinledgerError::UnknownPortfolio { id: portfolio_id })
    }

    pub fn get(&self, portfolio_id: u64) -> Result<PortfolioSnapshot, CoinledgerError> {
        let book = self.book(portfolio_id)?;
        let guard = book.read();
        Ok(snapshot_of(&guard))
    }

    /// Full transaction history, oldest first. The audit trail.
    pub fn transactions(&self, portfolio_id: u64) -> Result<Vec<Transaction>, CoinledgerError> {
        let book = self.book(portfolio_id)?;
        let guard = book.read();
        Ok(guard.transactions.iter().map(Transaction::rounded).collect())
    }

    /// Advisory pre-trade check. Never mutates.
    pub fn quote_trade(
        &self,
        portfolio_id: u64,
        intent: &TradeIntent,
    ) -> Result<TradeQuote, CoinledgerError> {
        intent.validate()?;
        let book = self.book(portfolio_id)?;
        let guard = book.read();
        let violations = risk::evaluate(&guard.portfolio, &guard.positions, intent);
        Ok(TradeQuote {
            allowed: violations.is_empty(),
            violations: violations.iter().map(|v| v.to_string()).collect(),
            version: guard.version,
        })
    }

    /// Atomically apply a filled trade. All risk checks re-run under the
    /// portfolio's exclusive lock; on any failure the ledger state is
    /// untouched. With `expected_version` set, an interleaved trade since
    /// the matching quote is rejected as a retryable conflict.
    pub fn commit_trade(
        &self,
        portfolio_id: u64,
        intent: &TradeIntent,
        expected_version: Option<u64>,
    ) -> Result<TradeReceipt, CoinledgerError> {
        intent.validate()?;
        let book = self.book(portfolio_id)?;
        let mut guard = book.write();

        if let Some(expected) = expected_version {
            if guard.version != expected {
                return Err(CoinledgerError::Conflict {
                    reason: format!(
                        "portfolio {portfolio_id} at version {}, quoted at {expected}",
                        guard.version
                    ),
                });
            }
        }

        let violations = risk::evaluate(&guard.portfolio, &guard.positions, intent);
        if !violations.is_empty() {
            warn!(
                portfolio_id,
                symbol = %intent.symbol,
                side = %intent.side,
                ?violations,
                "trade rejected"
            );
            return Err(violations_to_error(violations));
        }

        // mutate a working copy; the shared book is replaced only after
        // persistence succeeds
        let mut work = guard.clone();
        let transaction = work.apply(intent)?;

        if let Some(store) = &self.store {
            let position = work
                .latest_position(&intent.symbol)
                .ok_or_else(|| CoinledgerError::NoOpenPosition {
                    symbol: intent.symbol.clone(),
                })?;
            store
                .record_trade(
                    &work.portfolio.rounded(),
                    &position.rounded(),
                    &transaction.rounded(),
                )
                .map_err(|e| CoinledgerError::Persistence {
                    reason: e.to_string(),
                })?;
        }

        info!(
            portfolio_id,
            transaction_id = transaction.id,
            symbol = %intent.symbol,
            side = %intent.side,
            %intent.quantity,
            %intent.price,
            "trade committed"
        );

        let receipt = TradeReceipt {
            transaction: transaction.rounded(),
            cash_balance: super::money::round8(work.portfolio.cash_balance),
            total_value: super::money::round8(work.portfolio.total_value),
            version: work.version,
        };
        *guard = work;
        Ok(receipt)
    }

    /// Refresh valuation of open positions from current prices. Touches
    /// current_value/unrealized_pnl and the portfolio total, never cash.
    pub fn mark_to_market(
        &self,
        portfolio_id: u64,
        prices: &HashMap<String, Decimal>,
    ) -> Result<PortfolioSnapshot, CoinledgerError> {
        let book = self.book(portfolio_id)?;
        let mut guard = book.write();

        let mut work = guard.clone();
        for position in work.positions.iter_mut().filter(|p| p.is_open()) {
            if let Some(price) = prices.get(&position.symbol) {
                position.revalue(*price);
            }
        }
        work.portfolio.recompute(&work.positions);

        if let Some(store) = &self.store {
            let open: Vec<Position> = work
                .positions
                .iter()
                .filter(|p| p.is_open())
                .map(Position::rounded)
                .collect();
            store
                .record_valuation(&work.portfolio.rounded(), &open)
                .map_err(|e| CoinledgerError::Persistence {
                    reason: e.to_string(),
                })?;
        }

        *guard = work;
        Ok(snapshot_of(&guard))
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_of(book: &Book) -> PortfolioSnapshot {
    PortfolioSnapshot {
        portfolio: book.portfolio.rounded(),
        positions: book.positions.iter().map(Position::rounded).collect(),
        version: book.version,
    }
}

/// A single-cause rejection keeps its precise error type; multiple
/// simultaneous violations are bundled.
fn violations_to_error(mut violations: Vec<RiskViolation>) -> CoinledgerError {
    if violations.len() == 1 {
        match violations.remove(0) {
            RiskViolation::InsufficientFunds {
                required,
                available,
            } => CoinledgerError::InsufficientFunds {
                required,
                available,
            },
            RiskViolation::NoOpenPosition { symbol } => {
                CoinledgerError::NoOpenPosition { symbol }
            }
            RiskViolation::InsufficientPosition {
                symbol,
                requested,
                held,
            } => CoinledgerError::InsufficientPosition {
                symbol,
                requested,
                held,
            },
            other => CoinledgerError::RiskLimit {
                violations: vec![other.to_string()],
            },
        }
    } else {
        CoinledgerError::RiskLimit {
            violations: violations.iter().map(|v| v.to_string()).collect(),
        }
    }
}
