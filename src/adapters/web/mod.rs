//! HTTP transport adapter.
//!
//! Exposes the engine over JSON: a health probe and `POST /api/backtest`
//! accepting run parameters and returning the computed metrics plus the
//! trade ledger.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::{BacktestRequest, BacktestResponse, TradeInfo};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::ports::data_port::DataPort;

pub struct AppState {
    pub data_port: Arc<dyn DataPort + Send + Sync>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/api/backtest", post(handlers::run_backtest))
        .with_state(Arc::new(state))
}
