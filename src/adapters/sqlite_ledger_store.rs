//! SQLite ledger store adapter. Monetary values are stored as TEXT in
//! canonical decimal form, already rounded to 8 dp by the ledger.

use crate::domain::error::CoinledgerError;
use crate::domain::portfolio::Portfolio;
use crate::domain::position::{Position, PositionStatus};
use crate::domain::transaction::{Side, Transaction, TransactionStatus};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{BookRecord, LedgerStorePort};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use rust_decimal::Decimal;
use std::str::FromStr;

pub struct SqliteLedgerStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteLedgerStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CoinledgerError> {
        let db_path =
            config
                .get_string("ledger", "db_path")
                .ok_or_else(|| CoinledgerError::ConfigMissing {
                    section: "ledger".into(),
                    key: "db_path".into(),
                })?;

        let pool_size = config.get_int("ledger", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| CoinledgerError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, CoinledgerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| CoinledgerError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), CoinledgerError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| CoinledgerError::Database {
                reason: e.to_string(),
            })?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS portfolios (
                id INTEGER PRIMARY KEY,
                cash_balance TEXT NOT NULL,
                total_value TEXT NOT NULL,
                invested_amount TEXT NOT NULL,
                realized_pnl TEXT NOT NULL,
                unrealized_pnl TEXT NOT NULL,
                max_position_limit TEXT NOT NULL,
                daily_loss_limit TEXT NOT NULL,
                current_daily_loss TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS positions (
                portfolio_id INTEGER NOT NULL,
                id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                quantity TEXT NOT NULL,
                average_price TEXT NOT NULL,
                current_price TEXT NOT NULL,
                invested_amount TEXT NOT NULL,
                current_value TEXT NOT NULL,
                realized_pnl TEXT NOT NULL,
                unrealized_pnl TEXT NOT NULL,
                reserved_amount TEXT NOT NULL,
                status TEXT NOT NULL,
                opened_at TEXT NOT NULL,
                closed_at TEXT,
                PRIMARY KEY (portfolio_id, id)
            );
            CREATE TABLE IF NOT EXISTS transactions (
                portfolio_id INTEGER NOT NULL,
                id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity TEXT NOT NULL,
                price TEXT NOT NULL,
                total_amount TEXT NOT NULL,
                fee TEXT NOT NULL,
                realized_pnl TEXT,
                status TEXT NOT NULL,
                order_ref TEXT NOT NULL,
                executed_at TEXT NOT NULL,
                PRIMARY KEY (portfolio_id, id)
            );
            CREATE INDEX IF NOT EXISTS idx_positions_symbol ON positions(portfolio_id, symbol);
            CREATE INDEX IF NOT EXISTS idx_transactions_symbol ON transactions(portfolio_id, symbol);",
        )
        .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn upsert_portfolio(
        tx: &rusqlite::Transaction<'_>,
        portfolio: &Portfolio,
    ) -> Result<(), rusqlite::Error> {
        tx.execute(
            "INSERT OR REPLACE INTO portfolios (id, cash_balance, total_value, invested_amount,
                realized_pnl, unrealized_pnl, max_position_limit, daily_loss_limit,
                current_daily_loss, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                portfolio.id,
                portfolio.cash_balance.to_string(),
                portfolio.total_value.to_string(),
                portfolio.invested_amount.to_string(),
                portfolio.realized_pnl.to_string(),
                portfolio.unrealized_pnl.to_string(),
                portfolio.max_position_limit.to_string(),
                portfolio.daily_loss_limit.to_string(),
                portfolio.current_daily_loss.to_string(),
                portfolio.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn upsert_position(
        tx: &rusqlite::Transaction<'_>,
        position: &Position,
    ) -> Result<(), rusqlite::Error> {
        tx.execute(
            "INSERT OR REPLACE INTO positions (portfolio_id, id, symbol, quantity, average_price,
                current_price, invested_amount, current_value, realized_pnl, unrealized_pnl,
                reserved_amount, status, opened_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                position.portfolio_id,
                position.id,
                position.symbol,
                position.quantity.to_string(),
                position.average_price.to_string(),
                position.current_price.to_string(),
                position.invested_amount.to_string(),
                position.current_value.to_string(),
                position.realized_pnl.to_string(),
                position.unrealized_pnl.to_string(),
                position.reserved_amount.to_string(),
                match position.status {
                    PositionStatus::Open => "open",
                    PositionStatus::Closed => "closed",
                },
                position.opened_at.to_rfc3339(),
                position.closed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }
}

fn decimal_col(row: &rusqlite::Row<'_>, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;
    Decimal::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn timestamp_col(row: &rusqlite::Row<'_>, index: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

impl LedgerStorePort for SqliteLedgerStore {
    fn create_portfolio(&self, portfolio: &Portfolio) -> Result<(), CoinledgerError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| CoinledgerError::Database {
                reason: e.to_string(),
            })?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        Self::upsert_portfolio(&tx, portfolio).map_err(|e| CoinledgerError::DatabaseQuery {
            reason: e.to_string(),
        })?;
        tx.commit()
            .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn record_trade(
        &self,
        portfolio: &Portfolio,
        position: &Position,
        transaction: &Transaction,
    ) -> Result<(), CoinledgerError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| CoinledgerError::Database {
                reason: e.to_string(),
            })?;

        // single SQLite transaction: all three rows land or none do
        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Self::upsert_portfolio(&tx, portfolio)
            .and_then(|_| Self::upsert_position(&tx, position))
            .and_then(|_| {
                tx.execute(
                    "INSERT INTO transactions (portfolio_id, id, symbol, side, quantity, price,
                        total_amount, fee, realized_pnl, status, order_ref, executed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        transaction.portfolio_id,
                        transaction.id,
                        transaction.symbol,
                        transaction.side.to_string(),
                        transaction.quantity.to_string(),
                        transaction.price.to_string(),
                        transaction.total_amount.to_string(),
                        transaction.fee.to_string(),
                        transaction.realized_pnl.map(|p| p.to_string()),
                        "completed",
                        transaction.order_ref,
                        transaction.executed_at.to_rfc3339(),
                    ],
                )
                .map(|_| ())
            })
            .map_err(|e| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        tx.commit()
            .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn record_valuation(
        &self,
        portfolio: &Portfolio,
        positions: &[Position],
    ) -> Result<(), CoinledgerError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| CoinledgerError::Database {
                reason: e.to_string(),
            })?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Self::upsert_portfolio(&tx, portfolio).map_err(|e| CoinledgerError::DatabaseQuery {
            reason: e.to_string(),
        })?;
        for position in positions {
            Self::upsert_position(&tx, position).map_err(|e| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn load_books(&self) -> Result<Vec<BookRecord>, CoinledgerError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| CoinledgerError::Database {
                reason: e.to_string(),
            })?;

        let mut stmt = conn
            .prepare(
                "SELECT id, cash_balance, total_value, invested_amount, realized_pnl,
                    unrealized_pnl, max_position_limit, daily_loss_limit, current_daily_loss,
                    created_at
                 FROM portfolios ORDER BY id",
            )
            .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let portfolios = stmt
            .query_map([], |row| {
                Ok(Portfolio {
                    id: row.get(0)?,
                    cash_balance: decimal_col(row, 1)?,
                    total_value: decimal_col(row, 2)?,
                    invested_amount: decimal_col(row, 3)?,
                    realized_pnl: decimal_col(row, 4)?,
                    unrealized_pnl: decimal_col(row, 5)?,
                    max_position_limit: decimal_col(row, 6)?,
                    daily_loss_limit: decimal_col(row, 7)?,
                    current_daily_loss: decimal_col(row, 8)?,
                    created_at: timestamp_col(row, 9)?,
                })
            })
            .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?
            .collect::<Result<Vec<Portfolio>, rusqlite::Error>>()
            .map_err(|e| CoinledgerError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut records = Vec::with_capacity(portfolios.len());
        for portfolio in portfolios {
            let mut stmt = conn
                .prepare(
                    "SELECT id, symbol, quantity, average_price, current_price, invested_amount,
                        current_value, realized_pnl, unrealized_pnl, reserved_amount, status,
                        opened_at, closed_at
                     FROM positions WHERE portfolio_id = ?1 ORDER BY id",
                )
                .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

            let positions = stmt
                .query_map(params![portfolio.id], |row| {
                    let status: String = row.get(10)?;
                    let closed_at: Option<String> = row.get(12)?;
                    let closed_at = match closed_at {
                        Some(text) => Some(
                            DateTime::parse_from_rfc3339(&text)
                                .map(|t| t.with_timezone(&Utc))
                                .map_err(|e| {
                                    rusqlite::Error::FromSqlConversionFailure(
                                        12,
                                        rusqlite::types::Type::Text,
                                        Box::new(e),
                                    )
                                })?,
                        ),
                        None => None,
                    };
                    Ok(Position {
                        id: row.get(0)?,
                        portfolio_id: portfolio.id,
                        symbol: row.get(1)?,
                        quantity: decimal_col(row, 2)?,
                        average_price: decimal_col(row, 3)?,
                        current_price: decimal_col(row, 4)?,
                        invested_amount: decimal_col(row, 5)?,
                        current_value: decimal_col(row, 6)?,
                        realized_pnl: decimal_col(row, 7)?,
                        unrealized_pnl: decimal_col(row, 8)?,
                        reserved_amount: decimal_col(row, 9)?,
                        status: if status == "open" {
                            PositionStatus::Open
                        } else {
                            PositionStatus::Closed
                        },
                        opened_at: timestamp_col(row, 11)?,
                        closed_at,
                    })
                })
                .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                    reason: e.to_string(),
                })?
                .collect::<Result<Vec<Position>, rusqlite::Error>>()
                .map_err(|e| CoinledgerError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

            let mut stmt = conn
                .prepare(
                    "SELECT id, symbol, side, quantity, price, total_amount, fee, realized_pnl,
                        order_ref, executed_at
                     FROM transactions WHERE portfolio_id = ?1 ORDER BY id",
                )
                .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

            let transactions = stmt
                .query_map(params![portfolio.id], |row| {
                    let side: String = row.get(2)?;
                    let side = Side::from_str(&side).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    let realized_pnl: Option<String> = row.get(7)?;
                    let realized_pnl = match realized_pnl {
                        Some(text) => Some(Decimal::from_str(&text).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                7,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?),
                        None => None,
                    };
                    Ok(Transaction {
                        id: row.get(0)?,
                        portfolio_id: portfolio.id,
                        symbol: row.get(1)?,
                        side,
                        quantity: decimal_col(row, 3)?,
                        price: decimal_col(row, 4)?,
                        total_amount: decimal_col(row, 5)?,
                        fee: decimal_col(row, 6)?,
                        realized_pnl,
                        status: TransactionStatus::Completed,
                        order_ref: row.get(8)?,
                        executed_at: timestamp_col(row, 9)?,
                    })
                })
                .map_err(|e: rusqlite::Error| CoinledgerError::DatabaseQuery {
                    reason: e.to_string(),
                })?
                .collect::<Result<Vec<Transaction>, rusqlite::Error>>()
                .map_err(|e| CoinledgerError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

            records.push(BookRecord {
                portfolio,
                positions,
                transactions,
            });
        }

        Ok(records)
    }
}
