//! Backtest configuration parsing and validation.
//!
//! Validates every field a run depends on before any data is fetched, so a
//! bad config fails fast with a precise message instead of partway through
//! a simulation.

use crate::domain::error::BacksimError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Parameters of one backtest run, read from the `[backtest]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestParams {
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_cash: f64,
}

pub fn build_backtest_params(config: &dyn ConfigPort) -> Result<BacktestParams, BacksimError> {
    let symbols_raw = require_string(config, "backtest", "symbols")?;
    let symbols = parse_symbols(&symbols_raw)?;

    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;
    if start_date > end_date {
        return Err(BacksimError::ConfigInvalid {
            section: "backtest".into(),
            key: "start_date".into(),
            reason: "start_date must not be after end_date".into(),
        });
    }

    let initial_cash = config.get_double("backtest", "initial_cash", 0.0);
    if initial_cash <= 0.0 {
        return Err(BacksimError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_cash".into(),
            reason: "initial_cash must be positive".into(),
        });
    }

    Ok(BacktestParams {
        symbols,
        start_date,
        end_date,
        initial_cash,
    })
}

/// Split a comma-separated symbol list, normalizing to uppercase. Empty
/// tokens and duplicates are config errors.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, BacksimError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(BacksimError::ConfigInvalid {
                section: "backtest".into(),
                key: "symbols".into(),
                reason: "empty token in symbol list".into(),
            });
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(BacksimError::ConfigInvalid {
                section: "backtest".into(),
                key: "symbols".into(),
                reason: format!("duplicate symbol: {symbol}"),
            });
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, BacksimError> {
    config
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| BacksimError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

fn parse_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, BacksimError> {
    let raw = require_string(config, "backtest", key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| BacksimError::ConfigInvalid {
        section: "backtest".into(),
        key: key.into(),
        reason: format!("expected YYYY-MM-DD: {e}"),
    })
}
