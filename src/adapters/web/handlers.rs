//! HTTP request handlers.

use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::backtest::{load_dataset, run_backtest as run_backtest_engine};
use crate::domain::error::BacksimError;
use crate::domain::strategy::{BuyAndHoldStrategy, PriceThresholdStrategy, Strategy};
use crate::domain::trade::Trade;

use super::{AppState, WebError};

#[derive(Debug, Deserialize)]
pub struct BacktestRequest {
    pub symbols: Vec<String>,
    pub start_date: String,
    pub end_date: String,
    pub starting_cash: f64,
    pub strategy: String,
    #[serde(default)]
    pub strategy_params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct TradeInfo {
    pub side: String,
    pub symbol: String,
    pub shares: u64,
    pub price: f64,
    pub date: String,
}

impl From<&Trade> for TradeInfo {
    fn from(trade: &Trade) -> Self {
        TradeInfo {
            side: trade.side.to_string(),
            symbol: trade.symbol.clone(),
            shares: trade.shares,
            price: trade.price,
            date: trade.date.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BacktestResponse {
    pub profit_loss: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub win_probability: f64,
    pub trades: Vec<TradeInfo>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "backsim running" }))
}

pub async fn run_backtest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BacktestRequest>,
) -> Result<Json<BacktestResponse>, WebError> {
    let start_date = parse_date(&request.start_date, "start_date")?;
    let end_date = parse_date(&request.end_date, "end_date")?;
    if start_date > end_date {
        return Err(WebError::bad_request("start_date is after end_date"));
    }
    if request.starting_cash <= 0.0 {
        return Err(WebError::bad_request("starting_cash must be positive"));
    }

    let symbols: Vec<String> = request
        .symbols
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.is_empty() {
        return Err(WebError::bad_request("no symbols specified"));
    }

    let mut strategy = build_strategy(&request.strategy, &request.strategy_params)?;

    let dataset = load_dataset(&*state.data_port, &symbols, start_date, end_date)?;
    let result = run_backtest_engine(&dataset, strategy.as_mut(), request.starting_cash)?;

    Ok(Json(BacktestResponse {
        profit_loss: result.metrics.profit_loss,
        annualized_return: result.metrics.annualized_return,
        max_drawdown: result.metrics.max_drawdown,
        win_probability: result.metrics.win_probability,
        trades: result.portfolio.trades().iter().map(TradeInfo::from).collect(),
    }))
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, WebError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| WebError::bad_request(format!("invalid {field}, expected YYYY-MM-DD")))
}

/// Strategy registry for the transport boundary: request name plus JSON
/// parameters to a ready strategy instance.
pub fn build_strategy(
    name: &str,
    params: &serde_json::Map<String, serde_json::Value>,
) -> Result<Box<dyn Strategy + Send>, WebError> {
    let float = |key: &str| params.get(key).and_then(|v| v.as_f64());
    let int = |key: &str| params.get(key).and_then(|v| v.as_u64());

    match name {
        "price_threshold" => {
            let threshold = float("threshold")
                .ok_or_else(|| WebError::bad_request("price_threshold requires a numeric 'threshold' parameter"))?;
            let shares = int("shares").unwrap_or(1);
            let hold_days = int("hold_days").unwrap_or(30) as i64;
            Ok(Box::new(PriceThresholdStrategy::new(
                threshold, shares, hold_days,
            )))
        }
        "buy_and_hold" => {
            let shares = int("shares").unwrap_or(1);
            Ok(Box::new(BuyAndHoldStrategy::new(shares)))
        }
        _ => Err(BacksimError::UnknownStrategy {
            name: name.to_string(),
        }
        .into()),
    }
}
