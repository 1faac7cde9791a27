//! Data access port trait.

use crate::domain::error::BacksimError;
use crate::domain::ohlcv::PriceRecord;
use chrono::NaiveDate;

/// Supplier of validated daily price series. Implementations return a
/// complete, chronologically sorted sequence for the symbol and inclusive
/// range; the simulation core trusts that completeness.
pub trait DataPort {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceRecord>, BacksimError>;

    fn list_symbols(&self) -> Result<Vec<String>, BacksimError>;

    /// First date, last date, and row count for a symbol, or `None` when
    /// the store has no rows for it.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BacksimError>;
}
