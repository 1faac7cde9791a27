#![cfg(feature = "web")]

//! Web adapter tests: the JSON backtest endpoint end to end against a mock
//! data port.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use backsim::adapters::web::{build_router, AppState};
use common::*;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::util::ServiceExt;

fn test_router() -> axum::Router {
    let port = MockDataPort::new()
        .with_records("AAPL", close_series("AAPL", "2024-01-02", &[10.0, 12.0, 9.0]));
    build_router(AppState {
        data_port: Arc::new(port),
    })
}

async fn post_backtest(router: axum::Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/backtest")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn health_endpoint_responds() {
    let response = test_router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn backtest_returns_metrics_and_trades() {
    let (status, json) = post_backtest(
        test_router(),
        serde_json::json!({
            "symbols": ["aapl"],
            "start_date": "2024-01-02",
            "end_date": "2024-01-04",
            "starting_cash": 1000.0,
            "strategy": "buy_and_hold",
            "strategy_params": { "shares": 10 }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    // Bought 10 @ 10, liquidated @ 9.
    assert!((json["profit_loss"].as_f64().unwrap() - (-10.0)).abs() < 1e-9);
    assert_eq!(json["win_probability"].as_f64().unwrap(), 0.0);

    let trades = json["trades"].as_array().unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0]["side"], "BUY");
    assert_eq!(trades[0]["symbol"], "AAPL");
    assert_eq!(trades[0]["shares"], 10);
    assert_eq!(trades[1]["side"], "SELL");
    assert_eq!(trades[1]["date"], "2024-01-04");
}

#[tokio::test]
async fn unknown_strategy_is_a_bad_request() {
    let (status, json) = post_backtest(
        test_router(),
        serde_json::json!({
            "symbols": ["AAPL"],
            "start_date": "2024-01-02",
            "end_date": "2024-01-04",
            "starting_cash": 1000.0,
            "strategy": "momentum"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("momentum"));
}

#[tokio::test]
async fn unknown_symbol_is_not_found() {
    let (status, json) = post_backtest(
        test_router(),
        serde_json::json!({
            "symbols": ["GOOG"],
            "start_date": "2024-01-02",
            "end_date": "2024-01-04",
            "starting_cash": 1000.0,
            "strategy": "buy_and_hold"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("GOOG"));
}

#[tokio::test]
async fn invalid_dates_and_cash_are_rejected() {
    let (status, _) = post_backtest(
        test_router(),
        serde_json::json!({
            "symbols": ["AAPL"],
            "start_date": "02/01/2024",
            "end_date": "2024-01-04",
            "starting_cash": 1000.0,
            "strategy": "buy_and_hold"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_backtest(
        test_router(),
        serde_json::json!({
            "symbols": ["AAPL"],
            "start_date": "2024-01-02",
            "end_date": "2024-01-04",
            "starting_cash": 0.0,
            "strategy": "buy_and_hold"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn price_threshold_requires_its_parameter() {
    let (status, json) = post_backtest(
        test_router(),
        serde_json::json!({
            "symbols": ["AAPL"],
            "start_date": "2024-01-02",
            "end_date": "2024-01-04",
            "starting_cash": 1000.0,
            "strategy": "price_threshold",
            "strategy_params": {}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("threshold"));
}
