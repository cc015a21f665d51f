//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use crate::adapters::csv_adapter::CsvCandleAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::CoinledgerError;
use crate::domain::scorer::Scorer;
use crate::domain::scorer_config::ScorerConfig;
use crate::domain::transaction::{Side, TradeIntent};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "coinledger", about = "Trading signal engine and portfolio ledger")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the ledger database schema
    Init {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create a portfolio
    CreatePortfolio {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        cash: String,
        #[arg(long)]
        max_position_limit: String,
        #[arg(long)]
        daily_loss_limit: String,
    },
    /// Show a portfolio snapshot as JSON
    Show {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        portfolio: u64,
    },
    /// List a portfolio's transaction history as JSON lines
    History {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        portfolio: u64,
    },
    /// Check a trade against risk limits without committing it
    Quote {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        portfolio: u64,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        side: Side,
        #[arg(long)]
        quantity: String,
        #[arg(long)]
        price: String,
        #[arg(long, default_value = "0")]
        fee: String,
    },
    /// Commit a filled trade to the ledger
    Trade {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        portfolio: u64,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        side: Side,
        #[arg(long)]
        quantity: String,
        #[arg(long)]
        price: String,
        #[arg(long, default_value = "0")]
        fee: String,
        #[arg(long, default_value = "cli")]
        order_ref: String,
        /// Reject the trade if the portfolio has changed since this version
        #[arg(long)]
        expect_version: Option<u64>,
    },
    /// Revalue open positions from the latest candle closes
    Mark {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        portfolio: u64,
    },
    /// Score candle data and emit trading signals as JSON lines
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Score one symbol instead of every file in the candle directory
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate the signal scorer configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Init { config } => run_init(&config),
        Command::CreatePortfolio {
            config,
            cash,
            max_position_limit,
            daily_loss_limit,
        } => run_create_portfolio(&config, &cash, &max_position_limit, &daily_loss_limit),
        Command::Show { config, portfolio } => run_show(&config, portfolio),
        Command::History { config, portfolio } => run_history(&config, portfolio),
        Command::Quote {
            config,
            portfolio,
            symbol,
            side,
            quantity,
            price,
            fee,
        } => run_quote(&config, portfolio, &symbol, side, &quantity, &price, &fee),
        Command::Trade {
            config,
            portfolio,
            symbol,
            side,
            quantity,
            price,
            fee,
            order_ref,
            expect_version,
        } => run_trade(
            &config,
            portfolio,
            &symbol,
            side,
            &quantity,
            &price,
            &fee,
            order_ref,
            expect_version,
        ),
        Command::Mark { config, portfolio } => run_mark(&config, portfolio),
        Command::Scan { config, symbol } => run_scan(&config, symbol.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn parse_money(name: &str, value: &str) -> Result<Decimal, CoinledgerError> {
    Decimal::from_str(value).map_err(|e| CoinledgerError::Validation {
        reason: format!("invalid {name} '{value}': {e}"),
    })
}

fn build_intent(
    symbol: &str,
    side: Side,
    quantity: &str,
    price: &str,
    fee: &str,
    order_ref: String,
) -> Result<TradeIntent, CoinledgerError> {
    Ok(TradeIntent {
        symbol: symbol.to_string(),
        side,
        quantity: parse_money("quantity", quantity)?,
        price: parse_money("price", price)?,
        fee: parse_money("fee", fee)?,
        order_ref,
        executed_at: chrono::Utc::now(),
    })
}

fn candle_source(config: &dyn ConfigPort) -> Result<CsvCandleAdapter, CoinledgerError> {
    let dir = config
        .get_string("data", "candle_dir")
        .ok_or_else(|| CoinledgerError::ConfigMissing {
            section: "data".into(),
            key: "candle_dir".into(),
        })?;
    Ok(CsvCandleAdapter::new(PathBuf::from(dir)))
}

fn run_init(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_ledger_store::SqliteLedgerStore;

        let store = match SqliteLedgerStore::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
        if let Err(e) = store.initialize_schema() {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Ledger schema initialized");
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        eprintln!("error: sqlite feature is required for init");
        ExitCode::from(1)
    }
}

/// Open the durable ledger configured under `[ledger]`.
#[cfg(feature = "sqlite")]
fn open_ledger(config: &dyn ConfigPort) -> Result<crate::domain::ledger::Ledger, CoinledgerError> {
    use crate::adapters::sqlite_ledger_store::SqliteLedgerStore;
    use std::sync::Arc;

    let store = SqliteLedgerStore::from_config(config)?;
    store.initialize_schema()?;
    crate::domain::ledger::Ledger::with_store(Arc::new(store))
}

#[cfg(feature = "sqlite")]
fn with_ledger<F>(config_path: &PathBuf, f: F) -> ExitCode
where
    F: FnOnce(&crate::domain::ledger::Ledger) -> Result<(), CoinledgerError>,
{
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let ledger = match open_ledger(&config) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    match f(&ledger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

#[cfg(not(feature = "sqlite"))]
fn with_ledger<F>(config_path: &PathBuf, _f: F) -> ExitCode
where
    F: FnOnce(&crate::domain::ledger::Ledger) -> Result<(), CoinledgerError>,
{
    let _ = config_path;
    eprintln!("error: sqlite feature is required for ledger commands");
    ExitCode::from(1)
}

fn run_create_portfolio(
    config_path: &PathBuf,
    cash: &str,
    max_position_limit: &str,
    daily_loss_limit: &str,
) -> ExitCode {
    with_ledger(config_path, |ledger| {
        let id = ledger.create_portfolio(
            parse_money("cash", cash)?,
            parse_money("max_position_limit", max_position_limit)?,
            parse_money("daily_loss_limit", daily_loss_limit)?,
            chrono::Utc::now(),
        )?;
        println!("{id}");
        eprintln!("Portfolio {id} created");
        Ok(())
    })
}

fn run_show(config_path: &PathBuf, portfolio: u64) -> ExitCode {
    with_ledger(config_path, |ledger| {
        let snapshot = ledger.get(portfolio)?;
        let json = serde_json::json!({
            "portfolio": snapshot.portfolio,
            "positions": snapshot.positions,
            "version": snapshot.version,
        });
        println!("{json}");
        Ok(())
    })
}

fn run_history(config_path: &PathBuf, portfolio: u64) -> ExitCode {
    with_ledger(config_path, |ledger| {
        for transaction in ledger.transactions(portfolio)? {
            let line =
                serde_json::to_string(&transaction).map_err(|e| CoinledgerError::Data {
                    reason: format!("failed to encode transaction: {e}"),
                })?;
            println!("{line}");
        }
        Ok(())
    })
}

fn run_quote(
    config_path: &PathBuf,
    portfolio: u64,
    symbol: &str,
    side: Side,
    quantity: &str,
    price: &str,
    fee: &str,
) -> ExitCode {
    with_ledger(config_path, |ledger| {
        let intent = build_intent(symbol, side, quantity, price, fee, "quote".into())?;
        let quote = ledger.quote_trade(portfolio, &intent)?;
        let json = serde_json::json!({
            "allowed": quote.allowed,
            "violations": quote.violations,
            "version": quote.version,
        });
        println!("{json}");
        Ok(())
    })
}

#[allow(clippy::too_many_arguments)]
fn run_trade(
    config_path: &PathBuf,
    portfolio: u64,
    symbol: &str,
    side: Side,
    quantity: &str,
    price: &str,
    fee: &str,
    order_ref: String,
    expect_version: Option<u64>,
) -> ExitCode {
    with_ledger(config_path, |ledger| {
        let intent = build_intent(symbol, side, quantity, price, fee, order_ref)?;
        let receipt = ledger.commit_trade(portfolio, &intent, expect_version)?;
        let json = serde_json::json!({
            "transaction": receipt.transaction,
            "cash_balance": receipt.cash_balance,
            "total_value": receipt.total_value,
            "version": receipt.version,
        });
        println!("{json}");
        eprintln!(
            "Committed {} {} {} @ {}",
            side, quantity, symbol, price
        );
        Ok(())
    })
}

fn run_mark(config_path: &PathBuf, portfolio: u64) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let source = match candle_source(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    with_ledger(config_path, |ledger| {
        let snapshot = ledger.get(portfolio)?;
        let mut prices = std::collections::HashMap::new();
        for position in snapshot.positions.iter().filter(|p| p.is_open()) {
            let series = match source.fetch_candles(&position.symbol) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("warning: skipping {} ({})", position.symbol, e);
                    continue;
                }
            };
            let Some(latest) = series.latest() else {
                continue;
            };
            let Some(price) = Decimal::from_f64_retain(latest.close) else {
                eprintln!(
                    "warning: skipping {} (unusable close {})",
                    position.symbol, latest.close
                );
                continue;
            };
            prices.insert(position.symbol.clone(), price);
        }

        let snapshot = ledger.mark_to_market(portfolio, &prices)?;
        let json = serde_json::json!({
            "portfolio": snapshot.portfolio,
            "positions": snapshot.positions,
            "version": snapshot.version,
        });
        println!("{json}");
        Ok(())
    })
}

fn run_scan(config_path: &PathBuf, symbol: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let scorer_config = match ScorerConfig::from_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let scorer = Scorer::new(scorer_config);

    let source = match candle_source(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let symbols = match symbol {
        Some(s) => vec![s.to_string()],
        None => match source.list_symbols() {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        },
    };

    if symbols.is_empty() {
        eprintln!("error: no candle files found");
        return ExitCode::from(5);
    }

    // 0 disables the freshness check
    let max_age_minutes = config.get_int("data", "max_age_minutes", 0);

    let mut scored = 0usize;
    for symbol in &symbols {
        let series = match source.fetch_candles(symbol) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("warning: skipping {} ({})", symbol, e);
                continue;
            }
        };

        if max_age_minutes > 0
            && series.is_stale(chrono::Utc::now(), chrono::TimeDelta::minutes(max_age_minutes))
        {
            eprintln!("warning: skipping {} (candles older than {max_age_minutes} minutes)", symbol);
            continue;
        }

        let signal = scorer.score(&series);
        match serde_json::to_string(&signal) {
            Ok(line) => {
                println!("{line}");
                scored += 1;
            }
            Err(e) => eprintln!("warning: failed to encode signal for {}: {}", symbol, e),
        }
    }

    if scored == 0 {
        eprintln!("error: no symbols could be scored");
        return ExitCode::from(5);
    }
    eprintln!("{scored} signals emitted");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let scorer_config = match ScorerConfig::from_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("  low_confidence_threshold: {}", scorer_config.low_confidence_threshold);
    eprintln!("  min_history:              {}", scorer_config.min_history);
    eprintln!("  trend_weight:             {}", scorer_config.trend_weight);
    eprintln!("  momentum_weight:          {}", scorer_config.momentum_weight);
    eprintln!("  momentum_hold_weight:     {}", scorer_config.momentum_hold_weight);
    eprintln!("  macd_weight:              {}", scorer_config.macd_weight);
    eprintln!("  mean_reversion_weight:    {}", scorer_config.mean_reversion_weight);
    eprintln!("  volume_boost:             {}", scorer_config.volume_boost);
    eprintln!("  volume_ratio:             {}", scorer_config.volume_ratio);
    eprintln!("\nSignal configuration is valid.");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_money_accepts_decimal_strings() {
        assert_eq!(parse_money("cash", "10000.5").unwrap().to_string(), "10000.5");
    }

    #[test]
    fn parse_money_rejects_garbage() {
        assert!(matches!(
            parse_money("cash", "ten"),
            Err(CoinledgerError::Validation { .. })
        ));
    }

    #[test]
    fn build_intent_carries_fields() {
        let intent = build_intent("BTC-USD", Side::Buy, "0.5", "20000", "1.5", "x".into()).unwrap();
        assert_eq!(intent.symbol, "BTC-USD");
        assert_eq!(intent.total_amount().to_string(), "10000.0");
        assert_eq!(intent.fee.to_string(), "1.5");
    }

    #[test]
    fn cli_parses_trade_command() {
        let cli = Cli::parse_from([
            "coinledger",
            "trade",
            "--config",
            "/tmp/coinledger.ini",
            "--portfolio",
            "1",
            "--symbol",
            "BTC-USD",
            "--side",
            "buy",
            "--quantity",
            "0.5",
            "--price",
            "20000",
            "--expect-version",
            "3",
        ]);
        match cli.command {
            Command::Trade {
                portfolio,
                side,
                expect_version,
                ..
            } => {
                assert_eq!(portfolio, 1);
                assert_eq!(side, Side::Buy);
                assert_eq!(expect_version, Some(3));
            }
            other => panic!("expected Trade, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_scan_without_symbol() {
        let cli = Cli::parse_from(["coinledger", "scan", "--config", "/tmp/coinledger.ini"]);
        match cli.command {
            Command::Scan { symbol, .. } => assert!(symbol.is_none()),
            other => panic!("expected Scan, got {other:?}"),
        }
    }
}
