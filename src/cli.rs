//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::backtest::{load_dataset, run_backtest as run_backtest_engine};
use crate::domain::config_validation::{build_backtest_params, parse_symbols};
use crate::domain::error::BacksimError;
use crate::domain::strategy::{BuyAndHoldStrategy, PriceThresholdStrategy, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "backsim", about = "Historical daily-price backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Override the config's symbol list (comma-separated)
        #[arg(long)]
        symbols: Option<String>,
        /// Validate the config and strategy without running
        #[arg(long)]
        dry_run: bool,
    },
    /// Load CSV price files into the SQLite store
    #[cfg(feature = "sqlite")]
    Ingest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of {SYMBOL}.csv files
        #[arg(short, long)]
        dir: PathBuf,
        /// Only ingest this symbol (default: every file in the directory)
        #[arg(long)]
        symbol: Option<String>,
    },
    /// List symbols available in the data store
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored date range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Start the JSON API server
    #[cfg(feature = "web")]
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            symbols,
            dry_run,
        } => run_backtest(&config, symbols.as_deref(), dry_run),
        #[cfg(feature = "sqlite")]
        Command::Ingest {
            config,
            dir,
            symbol,
        } => run_ingest(&config, &dir, symbol.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        #[cfg(feature = "web")]
        Command::Serve { config } => run_serve(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            (&err).into()
        }
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, BacksimError> {
    FileConfigAdapter::from_file(path)
}

/// Pick the configured data source: a `[csv] dir` key selects the CSV
/// directory adapter, otherwise the SQLite store is used.
pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, BacksimError> {
    if let Some(dir) = config.get_string("csv", "dir") {
        return Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))));
    }
    open_default_store(config)
}

#[cfg(feature = "sqlite")]
fn open_default_store(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, BacksimError> {
    Ok(Box::new(SqliteAdapter::from_config(config)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_default_store(_config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, BacksimError> {
    Err(BacksimError::ConfigMissing {
        section: "csv".into(),
        key: "dir".into(),
    })
}

/// Strategy registry for the config boundary. The engine itself never sees
/// strategy names, only the built instance.
pub fn build_strategy(config: &dyn ConfigPort) -> Result<Box<dyn Strategy>, BacksimError> {
    let name = config
        .get_string("strategy", "name")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| BacksimError::ConfigMissing {
            section: "strategy".into(),
            key: "name".into(),
        })?;

    let positive_int = |key: &str, default: i64| -> Result<i64, BacksimError> {
        let value = config.get_int("strategy", key, default);
        if value <= 0 {
            return Err(BacksimError::ConfigInvalid {
                section: "strategy".into(),
                key: key.into(),
                reason: format!("{key} must be positive"),
            });
        }
        Ok(value)
    };

    match name.trim() {
        "price_threshold" => {
            let threshold = config.get_double("strategy", "threshold", f64::NAN);
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(BacksimError::ConfigInvalid {
                    section: "strategy".into(),
                    key: "threshold".into(),
                    reason: "threshold must be a positive number".into(),
                });
            }
            let shares = positive_int("shares", 1)? as u64;
            let hold_days = positive_int("hold_days", 30)?;
            Ok(Box::new(PriceThresholdStrategy::new(
                threshold, shares, hold_days,
            )))
        }
        "buy_and_hold" => {
            let shares = positive_int("shares", 1)? as u64;
            Ok(Box::new(BuyAndHoldStrategy::new(shares)))
        }
        other => Err(BacksimError::UnknownStrategy {
            name: other.to_string(),
        }),
    }
}

/// The config's symbol list, unless overridden on the command line.
pub fn resolve_symbols(
    override_list: Option<&str>,
    configured: Vec<String>,
) -> Result<Vec<String>, BacksimError> {
    match override_list {
        Some(list) => parse_symbols(list),
        None => Ok(configured),
    }
}

fn run_backtest(
    config_path: &PathBuf,
    symbols_override: Option<&str>,
    dry_run: bool,
) -> Result<(), BacksimError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;

    let mut params = build_backtest_params(&config)?;
    params.symbols = resolve_symbols(symbols_override, params.symbols)?;
    let mut strategy = build_strategy(&config)?;

    if dry_run {
        eprintln!(
            "Dry run OK: {} symbol(s), {} to {}, starting cash {:.2}",
            params.symbols.len(),
            params.start_date,
            params.end_date,
            params.initial_cash,
        );
        return Ok(());
    }

    let data_port = open_data_port(&config)?;

    eprintln!(
        "Running backtest: {} symbol(s), {} to {}",
        params.symbols.len(),
        params.start_date,
        params.end_date,
    );
    let dataset = load_dataset(
        data_port.as_ref(),
        &params.symbols,
        params.start_date,
        params.end_date,
    )?;
    eprintln!(
        "  {} records across {} dates",
        dataset.record_count(),
        dataset.dates().len(),
    );

    let result = run_backtest_engine(&dataset, strategy.as_mut(), params.initial_cash)?;
    let metrics = &result.metrics;
    let portfolio = &result.portfolio;

    println!("=== Results ===");
    println!("Profit/Loss:       {:.2}", metrics.profit_loss);
    println!("Annualized Return: {:.2}%", metrics.annualized_return * 100.0);
    println!("Max Drawdown:      {:.2}%", metrics.max_drawdown * 100.0);
    println!("Win Probability:   {:.1}%", metrics.win_probability * 100.0);
    println!(
        "Trades: {} executed, {} rejected",
        portfolio.trades().len(),
        portfolio.rejections().len(),
    );
    for trade in portfolio.trades() {
        println!(
            "  {} {} {:>6} {} @ {:.2}",
            trade.date, trade.side, trade.shares, trade.symbol, trade.price,
        );
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_ingest(
    config_path: &PathBuf,
    dir: &PathBuf,
    symbol: Option<&str>,
) -> Result<(), BacksimError> {
    let config = load_config(config_path)?;
    let store = SqliteAdapter::from_config(&config)?;
    let source = CsvAdapter::new(dir.clone());

    let symbols = match symbol {
        Some(s) => vec![s.to_uppercase()],
        None => source.list_symbols()?,
    };
    if symbols.is_empty() {
        return Err(BacksimError::Database {
            reason: format!("no CSV files found in {}", dir.display()),
        });
    }

    for symbol in &symbols {
        let records = source.read_all(symbol)?;
        store.insert_records(&records)?;
        eprintln!("  {}: {} rows ingested", symbol, records.len());
    }

    Ok(())
}

fn run_list_symbols(config_path: &PathBuf) -> Result<(), BacksimError> {
    let config = load_config(config_path)?;
    let data_port = open_data_port(&config)?;

    for symbol in data_port.list_symbols()? {
        println!("{symbol}");
    }
    Ok(())
}

fn run_info(config_path: &PathBuf, symbol: Option<&str>) -> Result<(), BacksimError> {
    let config = load_config(config_path)?;
    let data_port = open_data_port(&config)?;

    let symbols = match symbol {
        Some(s) => vec![s.to_uppercase()],
        None => data_port.list_symbols()?,
    };

    for symbol in &symbols {
        match data_port.get_data_range(symbol)? {
            Some((first, last, rows)) => {
                println!("{symbol}: {rows} rows, {first} to {last}");
            }
            None => println!("{symbol}: no data"),
        }
    }
    Ok(())
}

#[cfg(feature = "web")]
fn run_serve(config_path: &PathBuf) -> Result<(), BacksimError> {
    use crate::adapters::web::{build_router, AppState};
    use std::sync::Arc;

    let config = load_config(config_path)?;
    let bind = config
        .get_string("web", "bind")
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let data_port: Arc<dyn DataPort + Send + Sync> =
        Arc::new(SqliteAdapter::from_config(&config)?);
    let router = build_router(AppState { data_port });

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&bind).await?;
        eprintln!("Listening on {bind}");
        axum::serve(listener, router).await
    })?;

    Ok(())
}
