//! CSV directory data adapter.
//!
//! Serves price data from a directory of `{SYMBOL}.csv` files with the
//! column layout `date,open,high,low,close,adj_close,volume`. Also used as
//! the source side of the `ingest` command.

use crate::domain::error::BacksimError;
use crate::domain::ohlcv::PriceRecord;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    /// Read every row of one symbol's file, unfiltered.
    pub fn read_all(&self, symbol: &str) -> Result<Vec<PriceRecord>, BacksimError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| BacksimError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut records = Vec::new();

        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| BacksimError::Database {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;

            let field = |index: usize, name: &str| {
                row.get(index).ok_or_else(|| BacksimError::Database {
                    reason: format!("{}: row {}: missing {} column", path.display(), line + 1, name),
                })
            };
            let parse = |index: usize, name: &str| -> Result<f64, BacksimError> {
                f64::from_str(field(index, name)?).map_err(|e| BacksimError::Database {
                    reason: format!("{}: row {}: invalid {}: {}", path.display(), line + 1, name, e),
                })
            };

            let date = NaiveDate::parse_from_str(field(0, "date")?, "%Y-%m-%d").map_err(|e| {
                BacksimError::Database {
                    reason: format!("{}: row {}: invalid date: {}", path.display(), line + 1, e),
                }
            })?;
            let volume =
                i64::from_str(field(6, "volume")?).map_err(|e| BacksimError::Database {
                    reason: format!("{}: row {}: invalid volume: {}", path.display(), line + 1, e),
                })?;

            records.push(PriceRecord {
                symbol: symbol.to_string(),
                date,
                open: parse(1, "open")?,
                high: parse(2, "high")?,
                low: parse(3, "low")?,
                close: parse(4, "close")?,
                adjusted_close: parse(5, "adj_close")?,
                volume,
            });
        }

        records.sort_by_key(|r| r.date);
        Ok(records)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceRecord>, BacksimError> {
        let mut records = self.read_all(symbol)?;
        records.retain(|r| r.date >= start_date && r.date <= end_date);
        Ok(records)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacksimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BacksimError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BacksimError::Database {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BacksimError> {
        if !self.csv_path(symbol).exists() {
            return Ok(None);
        }
        let records = self.read_all(symbol)?;
        match (records.first(), records.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, records.len()))),
            _ => Ok(None),
        }
    }
}
