//! Trade intents and the executed-trade ledger entry.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// An intent to trade, produced by a strategy and consumed within the same
/// simulation step. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequest {
    pub symbol: String,
    pub shares: u64,
    pub side: Side,
}

impl TradeRequest {
    pub fn buy(symbol: impl Into<String>, shares: u64) -> Self {
        TradeRequest {
            symbol: symbol.into(),
            shares,
            side: Side::Buy,
        }
    }

    pub fn sell(symbol: impl Into<String>, shares: u64) -> Self {
        TradeRequest {
            symbol: symbol.into(),
            shares,
            side: Side::Sell,
        }
    }
}

/// An executed trade. Appended to the portfolio ledger when a request fills
/// (including forced liquidation sells); never mutated or removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub shares: u64,
    pub side: Side,
    pub price: f64,
    pub date: NaiveDate,
}
