//! Daily OHLCV price record.

use chrono::NaiveDate;

/// One day of price data for one symbol. Records are uniquely keyed by
/// (symbol, date) wherever they are stored or collected.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: f64,
    pub volume: i64,
}

impl PriceRecord {
    /// Ordering key used by the dataset: date first, then symbol.
    pub fn sort_key(&self) -> (NaiveDate, &str) {
        (self.date, self.symbol.as_str())
    }
}
