//! Pluggable trading strategies.
//!
//! A strategy only ever sees the expanding-window market slice and a
//! read-only portfolio view, and answers with trade requests for the
//! current date. The engine owns all mutation.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::market::MarketSlice;
use super::portfolio::Portfolio;
use super::trade::TradeRequest;

pub trait Strategy {
    /// One-time setup before the simulation loop starts.
    fn on_start(&mut self) {}

    /// Called once per simulated date. Returns zero or more trade requests
    /// to attempt on that date.
    fn next(&mut self, market: &MarketSlice<'_>, portfolio: &Portfolio) -> Vec<TradeRequest>;
}

/// Buys a fixed number of shares when a symbol's close crosses a threshold
/// from below, then closes the position after a holding period.
pub struct PriceThresholdStrategy {
    threshold: f64,
    shares: u64,
    hold_days: i64,
    entries: HashMap<String, NaiveDate>,
}

impl PriceThresholdStrategy {
    pub fn new(threshold: f64, shares: u64, hold_days: i64) -> Self {
        PriceThresholdStrategy {
            threshold,
            shares,
            hold_days,
            entries: HashMap::new(),
        }
    }
}

impl Strategy for PriceThresholdStrategy {
    fn next(&mut self, market: &MarketSlice<'_>, portfolio: &Portfolio) -> Vec<TradeRequest> {
        let Some(date) = market.latest_date() else {
            return Vec::new();
        };

        let mut requests = Vec::new();
        for symbol in market.symbols() {
            let held = portfolio.shares_held(symbol);
            if held > 0 {
                if let Some(&entered) = self.entries.get(symbol) {
                    if (date - entered).num_days() >= self.hold_days {
                        requests.push(TradeRequest::sell(symbol, held));
                        self.entries.remove(symbol);
                    }
                }
                continue;
            }

            // Not holding: clear any entry whose buy never filled.
            self.entries.remove(symbol);

            let history = market.symbol_history(symbol);
            let [.., previous, latest] = history.as_slice() else {
                continue;
            };
            if previous.close < self.threshold && latest.close >= self.threshold {
                requests.push(TradeRequest::buy(symbol, self.shares));
                self.entries.insert(symbol.to_string(), date);
            }
        }
        requests
    }
}

/// Buys a fixed number of shares of every symbol on the first simulated
/// date and holds until liquidation.
pub struct BuyAndHoldStrategy {
    shares: u64,
    entered: bool,
}

impl BuyAndHoldStrategy {
    pub fn new(shares: u64) -> Self {
        BuyAndHoldStrategy {
            shares,
            entered: false,
        }
    }
}

impl Strategy for BuyAndHoldStrategy {
    fn next(&mut self, market: &MarketSlice<'_>, _portfolio: &Portfolio) -> Vec<TradeRequest> {
        if self.entered || market.is_empty() {
            return Vec::new();
        }
        self.entered = true;
        market
            .symbols()
            .into_iter()
            .map(|symbol| TradeRequest::buy(symbol, self.shares))
            .collect()
    }
}
