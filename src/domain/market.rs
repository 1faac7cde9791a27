//! Market dataset and expanding-window slices.
//!
//! A [`MarketDataset`] is the validated, gap-free table of daily records the
//! simulation runs over: globally sorted by date then symbol, one record per
//! (date, symbol), immutable once built. Strategies and the portfolio only
//! ever see it through [`MarketSlice`] views.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use super::ohlcv::PriceRecord;

#[derive(Debug, Clone)]
pub struct MarketDataset {
    records: Vec<PriceRecord>,
    dates: Vec<NaiveDate>,
}

impl MarketDataset {
    /// Build a dataset from records in any order. Sorts by (date, symbol)
    /// and drops duplicate keys, keeping the first occurrence.
    pub fn from_records(mut records: Vec<PriceRecord>) -> Self {
        records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        records.dedup_by(|a, b| a.date == b.date && a.symbol == b.symbol);

        let mut dates = Vec::new();
        for record in &records {
            if dates.last() != Some(&record.date) {
                dates.push(record.date);
            }
        }

        MarketDataset { records, dates }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Distinct simulation dates in ascending order.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    /// Expanding window: every record dated on or before `date`.
    pub fn slice_through(&self, date: NaiveDate) -> MarketSlice<'_> {
        let end = self.records.partition_point(|r| r.date <= date);
        MarketSlice {
            records: &self.records[..end],
        }
    }

    /// The slice covering the entire dataset, used for terminal liquidation.
    pub fn full_slice(&self) -> MarketSlice<'_> {
        MarketSlice {
            records: &self.records,
        }
    }
}

/// Read-only view over a date-ordered prefix of a dataset. Cheap to copy,
/// never mutated by consumers.
#[derive(Debug, Clone, Copy)]
pub struct MarketSlice<'a> {
    records: &'a [PriceRecord],
}

impl<'a> MarketSlice<'a> {
    pub fn records(&self) -> &'a [PriceRecord] {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The slice's maximum date, i.e. the current simulated day.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// Closing price of `symbol` on the slice's maximum date. `None` when
    /// the symbol has no record on that date.
    pub fn close(&self, symbol: &str) -> Option<f64> {
        let date = self.latest_date()?;
        let start = self.records.partition_point(|r| r.date < date);
        let day = &self.records[start..];
        day.binary_search_by(|r| r.symbol.as_str().cmp(symbol))
            .ok()
            .map(|i| day[i].close)
    }

    /// All symbols appearing anywhere in the slice, sorted.
    pub fn symbols(&self) -> Vec<&'a str> {
        self.records
            .iter()
            .map(|r| r.symbol.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every record for `symbol`, oldest first.
    pub fn symbol_history(&self, symbol: &str) -> Vec<&'a PriceRecord> {
        self.records
            .iter()
            .filter(|r| r.symbol == symbol)
            .collect()
    }
}
