//! Backtest engine: the date-by-date simulation loop.

use chrono::NaiveDate;

use super::error::BacksimError;
use super::market::MarketDataset;
use super::metrics::Metrics;
use super::portfolio::Portfolio;
use super::strategy::Strategy;
use crate::ports::data_port::DataPort;

/// Outcome of a completed run: the finalized portfolio plus the statistics
/// derived from it.
#[derive(Debug)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub metrics: Metrics,
}

/// Fetch each requested symbol's rows and assemble the dataset.
///
/// A symbol with zero rows in the range is a setup failure: the whole run
/// is refused before the loop starts rather than silently simulating a
/// subset of the request.
pub fn load_dataset(
    data_port: &dyn DataPort,
    symbols: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<MarketDataset, BacksimError> {
    let mut records = Vec::new();
    for symbol in symbols {
        let rows = data_port.fetch_ohlcv(symbol, start_date, end_date)?;
        if rows.is_empty() {
            return Err(BacksimError::DataUnavailable {
                symbol: symbol.clone(),
            });
        }
        records.extend(rows);
    }
    Ok(MarketDataset::from_records(records))
}

/// Replay the dataset through the strategy, one date at a time.
///
/// Each date is fully processed before the next begins: value snapshot,
/// strategy decision, trade execution. After the last date the portfolio is
/// force-liquidated against the final market snapshot and metrics are
/// computed over the finished state.
pub fn run_backtest(
    dataset: &MarketDataset,
    strategy: &mut dyn Strategy,
    initial_cash: f64,
) -> Result<BacktestResult, BacksimError> {
    let mut portfolio = Portfolio::new(initial_cash);
    strategy.on_start();

    for &date in dataset.dates() {
        let slice = dataset.slice_through(date);
        portfolio.update_value(&slice)?;
        let requests = strategy.next(&slice, &portfolio);
        portfolio.execute_trades(&slice, requests);
    }

    portfolio.liquidate(&dataset.full_slice())?;

    let metrics = Metrics::compute(dataset, &portfolio);
    Ok(BacktestResult { portfolio, metrics })
}
