#![allow(dead_code)]

use backsim::domain::error::BacksimError;
use backsim::domain::market::MarketDataset;
pub use backsim::domain::ohlcv::PriceRecord;
use backsim::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceRecord>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_records(mut self, symbol: &str, records: Vec<PriceRecord>) -> Self {
        self.data.insert(symbol.to_string(), records);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceRecord>, BacksimError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BacksimError::Database {
                reason: reason.clone(),
            });
        }
        let mut records = self.data.get(symbol).cloned().unwrap_or_default();
        records.retain(|r| r.date >= start_date && r.date <= end_date);
        Ok(records)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacksimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BacksimError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BacksimError::Database {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(records) if !records.is_empty() => {
                let min = records.iter().map(|r| r.date).min().unwrap();
                let max = records.iter().map(|r| r.date).max().unwrap();
                Ok(Some((min, max, records.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn make_record(symbol: &str, date: &str, close: f64) -> PriceRecord {
    PriceRecord {
        symbol: symbol.to_string(),
        date: parse_date(date),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        adjusted_close: close,
        volume: 10_000,
    }
}

pub fn make_dataset(records: Vec<PriceRecord>) -> MarketDataset {
    MarketDataset::from_records(records)
}

pub fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Daily closes for one symbol starting at `start`, one record per close.
pub fn close_series(symbol: &str, start: &str, closes: &[f64]) -> Vec<PriceRecord> {
    let start = parse_date(start);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceRecord {
            symbol: symbol.to_string(),
            date: start + chrono::Days::new(i as u64),
            open: close,
            high: close,
            low: close,
            close,
            adjusted_close: close,
            volume: 10_000,
        })
        .collect()
}
