//! Portfolio state machine: cash, holdings, trade ledger, valuation history.
//!
//! One instance per run, exclusively owned and mutated by the engine driving
//! it. Each simulated date mutates it at most twice (snapshot, execution);
//! liquidation is a one-way transition after the last step, after which the
//! portfolio is only read.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::error::BacksimError;
use super::market::MarketSlice;
use super::trade::{Side, Trade, TradeRequest};

/// Mark-to-market value of one holding on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingValue {
    pub date: NaiveDate,
    pub symbol: String,
    pub value: f64,
}

/// Cash balance snapshot for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct CashPoint {
    pub date: NaiveDate,
    pub cash: f64,
}

/// Why a trade request was dropped. Rejection is a normal business outcome,
/// not an error; the request simply produces no ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Request for zero shares.
    EmptyRequest,
    /// Sell for a symbol with no open holding.
    NotHeld,
    /// Sell for more shares than are held.
    InsufficientShares { held: u64, requested: u64 },
    /// Buy whose cost exceeds available cash.
    InsufficientCash { cost: f64, available: f64 },
    /// The symbol has no price on the acting date.
    NoQuote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRequest {
    pub request: TradeRequest,
    pub date: NaiveDate,
    pub reason: RejectReason,
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_cash: f64,
    cash: f64,
    holdings: BTreeMap<String, u64>,
    trades: Vec<Trade>,
    valuation_history: Vec<HoldingValue>,
    cash_history: Vec<CashPoint>,
    rejections: Vec<RejectedRequest>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            initial_cash,
            cash: initial_cash,
            holdings: BTreeMap::new(),
            trades: Vec::new(),
            valuation_history: Vec::new(),
            cash_history: Vec::new(),
            rejections: Vec::new(),
        }
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn holdings(&self) -> &BTreeMap<String, u64> {
        &self.holdings
    }

    pub fn shares_held(&self, symbol: &str) -> u64 {
        self.holdings.get(symbol).copied().unwrap_or(0)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn valuation_history(&self) -> &[HoldingValue] {
        &self.valuation_history
    }

    pub fn cash_history(&self) -> &[CashPoint] {
        &self.cash_history
    }

    pub fn rejections(&self) -> &[RejectedRequest] {
        &self.rejections
    }

    /// Record the cash balance and the mark-to-market value of every open
    /// holding as of the slice's maximum date.
    ///
    /// A held symbol with no quote on that date is a data-integrity failure;
    /// the run must abort rather than skip the entry, since a gap here would
    /// silently corrupt the drawdown series.
    pub fn update_value(&mut self, market: &MarketSlice<'_>) -> Result<(), BacksimError> {
        let Some(date) = market.latest_date() else {
            return Ok(());
        };

        self.cash_history.push(CashPoint {
            date,
            cash: self.cash,
        });

        for (symbol, &shares) in &self.holdings {
            if shares == 0 {
                continue;
            }
            let close = market
                .close(symbol)
                .ok_or_else(|| BacksimError::MissingPrice {
                    symbol: symbol.clone(),
                    date,
                })?;
            self.valuation_history.push(HoldingValue {
                date,
                symbol: symbol.clone(),
                value: shares as f64 * close,
            });
        }

        Ok(())
    }

    /// Execute a batch of trade requests against the slice's maximum date.
    ///
    /// All sells run before any buy so that proceeds are available to the
    /// same step's buys; within each side the caller's order is preserved.
    /// Every trade fills at the acting date's close. Requests that fail a
    /// gate are dropped and recorded as rejections.
    pub fn execute_trades(&mut self, market: &MarketSlice<'_>, requests: Vec<TradeRequest>) {
        let Some(date) = market.latest_date() else {
            return;
        };

        let (sells, buys): (Vec<TradeRequest>, Vec<TradeRequest>) = requests
            .into_iter()
            .partition(|r| r.side == Side::Sell);

        for request in sells {
            self.execute_sell(market, date, request);
        }
        for request in buys {
            self.execute_buy(market, date, request);
        }
    }

    fn execute_sell(&mut self, market: &MarketSlice<'_>, date: NaiveDate, request: TradeRequest) {
        if request.shares == 0 {
            return self.reject(request, date, RejectReason::EmptyRequest);
        }
        let held = self.shares_held(&request.symbol);
        if held == 0 {
            return self.reject(request, date, RejectReason::NotHeld);
        }
        if request.shares > held {
            let reason = RejectReason::InsufficientShares {
                held,
                requested: request.shares,
            };
            return self.reject(request, date, reason);
        }
        let Some(close) = market.close(&request.symbol) else {
            return self.reject(request, date, RejectReason::NoQuote);
        };

        if let Some(shares) = self.holdings.get_mut(&request.symbol) {
            *shares -= request.shares;
        }
        self.cash += request.shares as f64 * close;
        self.trades.push(Trade {
            symbol: request.symbol,
            shares: request.shares,
            side: Side::Sell,
            price: close,
            date,
        });
    }

    fn execute_buy(&mut self, market: &MarketSlice<'_>, date: NaiveDate, request: TradeRequest) {
        if request.shares == 0 {
            return self.reject(request, date, RejectReason::EmptyRequest);
        }
        let Some(close) = market.close(&request.symbol) else {
            return self.reject(request, date, RejectReason::NoQuote);
        };
        let cost = request.shares as f64 * close;
        if cost > self.cash {
            return self.reject(
                request,
                date,
                RejectReason::InsufficientCash {
                    cost,
                    available: self.cash,
                },
            );
        }

        *self.holdings.entry(request.symbol.clone()).or_insert(0) += request.shares;
        self.cash -= cost;
        self.trades.push(Trade {
            symbol: request.symbol,
            shares: request.shares,
            side: Side::Buy,
            price: close,
            date,
        });
    }

    fn reject(&mut self, request: TradeRequest, date: NaiveDate, reason: RejectReason) {
        self.rejections.push(RejectedRequest {
            request,
            date,
            reason,
        });
    }

    /// Force-sell every open holding at the slice's maximum date's close.
    ///
    /// Must run exactly once, after the final execution step, against the
    /// true final market snapshot. Afterwards the holdings map is empty.
    pub fn liquidate(&mut self, market: &MarketSlice<'_>) -> Result<(), BacksimError> {
        let open: Vec<(String, u64)> = self
            .holdings
            .iter()
            .filter(|&(_, &shares)| shares > 0)
            .map(|(symbol, &shares)| (symbol.clone(), shares))
            .collect();

        if open.is_empty() {
            self.holdings.clear();
            return Ok(());
        }

        let Some(date) = market.latest_date() else {
            return Err(BacksimError::DataUnavailable {
                symbol: open[0].0.clone(),
            });
        };

        for (symbol, shares) in open {
            let close = market
                .close(&symbol)
                .ok_or_else(|| BacksimError::MissingPrice {
                    symbol: symbol.clone(),
                    date,
                })?;
            self.cash += shares as f64 * close;
            self.trades.push(Trade {
                symbol,
                shares,
                side: Side::Sell,
                price: close,
                date,
            });
        }

        self.holdings.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketDataset;
    use crate::domain::ohlcv::PriceRecord;
    use proptest::prelude::*;

    fn record(symbol: &str, date: &str, close: f64) -> PriceRecord {
        PriceRecord {
            symbol: symbol.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            adjusted_close: close,
            volume: 1000,
        }
    }

    fn single_day_dataset() -> MarketDataset {
        MarketDataset::from_records(vec![
            record("AAPL", "2024-01-02", 10.0),
            record("MSFT", "2024-01-02", 50.0),
        ])
    }

    #[test]
    fn new_portfolio_is_flat() {
        let portfolio = Portfolio::new(1000.0);
        assert!((portfolio.cash() - 1000.0).abs() < f64::EPSILON);
        assert!((portfolio.initial_cash() - 1000.0).abs() < f64::EPSILON);
        assert!(portfolio.holdings().is_empty());
        assert!(portfolio.trades().is_empty());
        assert!(portfolio.valuation_history().is_empty());
        assert!(portfolio.cash_history().is_empty());
        assert!(portfolio.rejections().is_empty());
    }

    #[test]
    fn update_value_records_cash_and_holdings() {
        let dataset = single_day_dataset();
        let slice = dataset.full_slice();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(&slice, vec![TradeRequest::buy("AAPL", 10)]);
        portfolio.update_value(&slice).unwrap();

        assert_eq!(portfolio.cash_history().len(), 1);
        assert!((portfolio.cash_history()[0].cash - 900.0).abs() < f64::EPSILON);

        assert_eq!(portfolio.valuation_history().len(), 1);
        let point = &portfolio.valuation_history()[0];
        assert_eq!(point.symbol, "AAPL");
        assert!((point.value - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn update_value_skips_fully_sold_holdings() {
        let dataset = single_day_dataset();
        let slice = dataset.full_slice();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(
            &slice,
            vec![TradeRequest::buy("AAPL", 10), TradeRequest::sell("AAPL", 10)],
        );
        // Sells run first, so the sell is rejected and the buy fills; sell
        // the next step instead to leave a zero entry.
        portfolio.execute_trades(&slice, vec![TradeRequest::sell("AAPL", 10)]);
        portfolio.update_value(&slice).unwrap();

        assert_eq!(portfolio.shares_held("AAPL"), 0);
        assert!(portfolio.valuation_history().is_empty());
    }

    #[test]
    fn update_value_fails_when_held_symbol_has_no_quote() {
        let dataset = MarketDataset::from_records(vec![
            record("AAPL", "2024-01-02", 10.0),
            record("MSFT", "2024-01-03", 50.0),
        ]);
        let mut portfolio = Portfolio::new(1000.0);

        let day_one = dataset.slice_through(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        portfolio.execute_trades(&day_one, vec![TradeRequest::buy("AAPL", 5)]);

        // AAPL has no record on the second date.
        let result = portfolio.update_value(&dataset.full_slice());
        assert!(matches!(
            result,
            Err(BacksimError::MissingPrice { symbol, .. }) if symbol == "AAPL"
        ));
    }

    #[test]
    fn buy_fills_at_close_and_debits_cash() {
        let dataset = single_day_dataset();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(&dataset.full_slice(), vec![TradeRequest::buy("AAPL", 10)]);

        assert_eq!(portfolio.shares_held("AAPL"), 10);
        assert!((portfolio.cash() - 900.0).abs() < f64::EPSILON);
        assert_eq!(portfolio.trades().len(), 1);

        let trade = &portfolio.trades()[0];
        assert_eq!(trade.side, Side::Buy);
        assert!((trade.price - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buy_rejected_when_cost_exceeds_cash() {
        let dataset = single_day_dataset();
        let mut portfolio = Portfolio::new(100.0);

        portfolio.execute_trades(&dataset.full_slice(), vec![TradeRequest::buy("MSFT", 3)]);

        assert_eq!(portfolio.shares_held("MSFT"), 0);
        assert!((portfolio.cash() - 100.0).abs() < f64::EPSILON);
        assert!(portfolio.trades().is_empty());
        assert_eq!(portfolio.rejections().len(), 1);
        assert!(matches!(
            portfolio.rejections()[0].reason,
            RejectReason::InsufficientCash { .. }
        ));
    }

    #[test]
    fn buy_at_exactly_available_cash_fills() {
        let dataset = single_day_dataset();
        let mut portfolio = Portfolio::new(100.0);

        portfolio.execute_trades(&dataset.full_slice(), vec![TradeRequest::buy("AAPL", 10)]);

        assert_eq!(portfolio.shares_held("AAPL"), 10);
        assert!((portfolio.cash() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_rejected_when_not_held() {
        let dataset = single_day_dataset();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(&dataset.full_slice(), vec![TradeRequest::sell("AAPL", 1)]);

        assert!(portfolio.trades().is_empty());
        assert_eq!(portfolio.rejections().len(), 1);
        assert_eq!(portfolio.rejections()[0].reason, RejectReason::NotHeld);
    }

    #[test]
    fn sell_rejected_when_over_held_shares() {
        let dataset = single_day_dataset();
        let slice = dataset.full_slice();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(&slice, vec![TradeRequest::buy("AAPL", 5)]);
        portfolio.execute_trades(&slice, vec![TradeRequest::sell("AAPL", 6)]);

        assert_eq!(portfolio.shares_held("AAPL"), 5);
        assert_eq!(portfolio.trades().len(), 1);
        assert!(matches!(
            portfolio.rejections()[0].reason,
            RejectReason::InsufficientShares { held: 5, requested: 6 }
        ));
    }

    #[test]
    fn unknown_symbol_is_rejected_not_a_crash() {
        let dataset = single_day_dataset();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(&dataset.full_slice(), vec![TradeRequest::buy("GOOG", 1)]);

        assert!(portfolio.trades().is_empty());
        assert_eq!(portfolio.rejections()[0].reason, RejectReason::NoQuote);
    }

    #[test]
    fn zero_share_request_is_rejected() {
        let dataset = single_day_dataset();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(&dataset.full_slice(), vec![TradeRequest::buy("AAPL", 0)]);

        assert!(portfolio.trades().is_empty());
        assert_eq!(portfolio.rejections()[0].reason, RejectReason::EmptyRequest);
    }

    #[test]
    fn sells_execute_before_buys_freeing_cash() {
        let dataset = single_day_dataset();
        let slice = dataset.full_slice();
        let mut portfolio = Portfolio::new(100.0);

        portfolio.execute_trades(&slice, vec![TradeRequest::buy("AAPL", 10)]);
        assert!((portfolio.cash() - 0.0).abs() < f64::EPSILON);

        // Caller interleaves the buy first; the sell must still run first,
        // freeing the cash that funds the MSFT buy.
        portfolio.execute_trades(
            &slice,
            vec![TradeRequest::buy("MSFT", 2), TradeRequest::sell("AAPL", 10)],
        );

        assert_eq!(portfolio.shares_held("AAPL"), 0);
        assert_eq!(portfolio.shares_held("MSFT"), 2);
        assert!((portfolio.cash() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn order_within_a_side_is_stable() {
        let dataset = single_day_dataset();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(
            &dataset.full_slice(),
            vec![
                TradeRequest::buy("MSFT", 1),
                TradeRequest::buy("AAPL", 1),
                TradeRequest::buy("MSFT", 2),
            ],
        );

        let symbols: Vec<&str> = portfolio
            .trades()
            .iter()
            .map(|t| t.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["MSFT", "AAPL", "MSFT"]);
        assert_eq!(portfolio.trades()[2].shares, 2);
    }

    #[test]
    fn liquidate_sells_everything_and_clears_holdings() {
        let dataset = single_day_dataset();
        let slice = dataset.full_slice();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(
            &slice,
            vec![TradeRequest::buy("AAPL", 10), TradeRequest::buy("MSFT", 2)],
        );
        portfolio.liquidate(&slice).unwrap();

        assert!(portfolio.holdings().is_empty());
        assert!((portfolio.cash() - 1000.0).abs() < f64::EPSILON);

        let sells: Vec<&Trade> = portfolio
            .trades()
            .iter()
            .filter(|t| t.side == Side::Sell)
            .collect();
        assert_eq!(sells.len(), 2);
    }

    #[test]
    fn liquidate_with_no_holdings_is_a_no_op() {
        let dataset = single_day_dataset();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.liquidate(&dataset.full_slice()).unwrap();

        assert!(portfolio.trades().is_empty());
        assert!((portfolio.cash() - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn liquidate_fails_when_held_symbol_has_no_final_quote() {
        let dataset = MarketDataset::from_records(vec![
            record("AAPL", "2024-01-02", 10.0),
            record("MSFT", "2024-01-03", 50.0),
        ]);
        let mut portfolio = Portfolio::new(1000.0);

        let day_one = dataset.slice_through(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        portfolio.execute_trades(&day_one, vec![TradeRequest::buy("AAPL", 5)]);

        let result = portfolio.liquidate(&dataset.full_slice());
        assert!(matches!(
            result,
            Err(BacksimError::MissingPrice { symbol, .. }) if symbol == "AAPL"
        ));
    }

    /// Sum the ledger back up and compare against recorded final cash.
    fn conservation_residual(portfolio: &Portfolio) -> f64 {
        let mut expected = portfolio.initial_cash();
        for trade in portfolio.trades() {
            let value = trade.shares as f64 * trade.price;
            match trade.side {
                Side::Buy => expected -= value,
                Side::Sell => expected += value,
            }
        }
        (expected - portfolio.cash()).abs()
    }

    #[test]
    fn ledger_reproduces_final_cash() {
        let dataset = single_day_dataset();
        let slice = dataset.full_slice();
        let mut portfolio = Portfolio::new(1000.0);

        portfolio.execute_trades(
            &slice,
            vec![TradeRequest::buy("AAPL", 7), TradeRequest::buy("MSFT", 3)],
        );
        portfolio.execute_trades(&slice, vec![TradeRequest::sell("AAPL", 2)]);
        portfolio.liquidate(&slice).unwrap();

        assert!(conservation_residual(&portfolio) < 1e-9);
    }

    proptest! {
        /// Cash stays non-negative and the ledger reproduces final cash for
        /// arbitrary request streams, including over-requests that must be
        /// rejected.
        #[test]
        fn random_request_streams_conserve_cash(
            batches in prop::collection::vec(
                prop::collection::vec(
                    (0..2usize, 0..40u64, prop::bool::ANY),
                    0..6,
                ),
                1..8,
            )
        ) {
            let symbols = ["AAPL", "MSFT"];
            let mut records = Vec::new();
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            for day in 0..batches.len() {
                let date = start + chrono::Days::new(day as u64);
                for (i, symbol) in symbols.iter().enumerate() {
                    records.push(PriceRecord {
                        symbol: symbol.to_string(),
                        date,
                        open: 10.0,
                        high: 12.0,
                        low: 9.0,
                        close: 10.0 + i as f64 + day as f64,
                        adjusted_close: 10.0 + i as f64,
                        volume: 1000,
                    });
                }
            }
            let dataset = MarketDataset::from_records(records);

            let mut portfolio = Portfolio::new(500.0);
            for (day, batch) in batches.iter().enumerate() {
                let date = start + chrono::Days::new(day as u64);
                let slice = dataset.slice_through(date);
                portfolio.update_value(&slice).unwrap();
                let requests = batch
                    .iter()
                    .map(|&(idx, shares, is_buy)| TradeRequest {
                        symbol: symbols[idx].to_string(),
                        shares,
                        side: if is_buy { Side::Buy } else { Side::Sell },
                    })
                    .collect();
                portfolio.execute_trades(&slice, requests);
                prop_assert!(portfolio.cash() >= 0.0);
            }
            portfolio.liquidate(&dataset.full_slice()).unwrap();

            prop_assert!(portfolio.cash() >= 0.0);
            prop_assert!(portfolio.holdings().is_empty());
            prop_assert!(conservation_residual(&portfolio) < 1e-6);
        }
    }
}
