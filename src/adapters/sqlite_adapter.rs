//! SQLite data adapter.
//!
//! Persists daily price rows in a `symbol_data` table keyed by
//! (symbol, date), and serves them back through [`DataPort`].

use crate::domain::error::BacksimError;
use crate::domain::ohlcv::PriceRecord;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BacksimError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| BacksimError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| BacksimError::Database {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, BacksimError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| BacksimError::Database {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn initialize_schema(&self) -> Result<(), BacksimError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| BacksimError::Database {
                reason: e.to_string(),
            })?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS symbol_data (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                adjusted_close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_symbol_data_date ON symbol_data(date);",
        )
        .map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Insert or replace a batch of rows inside one transaction.
    pub fn insert_records(&self, records: &[PriceRecord]) -> Result<(), BacksimError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| BacksimError::Database {
                reason: e.to_string(),
            })?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        for record in records {
            tx.execute(
                "INSERT OR REPLACE INTO symbol_data
                 (symbol, date, open, high, low, close, adjusted_close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.symbol,
                    record.date.format(DATE_FORMAT).to_string(),
                    record.open,
                    record.high,
                    record.low,
                    record.close,
                    record.adjusted_close,
                    record.volume
                ],
            )
            .map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
                reason: e.to_string(),
            })
    }
}

fn parse_row_date(raw: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

impl DataPort for SqliteAdapter {
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceRecord>, BacksimError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| BacksimError::Database {
                reason: e.to_string(),
            })?;

        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, open, high, low, close, adjusted_close, volume
                 FROM symbol_data
                 WHERE symbol = ?1 AND date BETWEEN ?2 AND ?3
                 ORDER BY date ASC",
            )
            .map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok(PriceRecord {
                        symbol: row.get(0)?,
                        date: parse_row_date(&row.get::<_, String>(1)?)?,
                        open: row.get(2)?,
                        high: row.get(3)?,
                        low: row.get(4)?,
                        close: row.get(5)?,
                        adjusted_close: row.get(6)?,
                        volume: row.get(7)?,
                    })
                },
            )
            .map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }
        Ok(records)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacksimError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| BacksimError::Database {
                reason: e.to_string(),
            })?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM symbol_data ORDER BY symbol")
            .map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(|e: rusqlite::Error| BacksimError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, BacksimError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| BacksimError::Database {
                reason: e.to_string(),
            })?;

        let result = conn.query_row(
            "SELECT MIN(date), MAX(date), COUNT(*) FROM symbol_data WHERE symbol = ?1",
            params![symbol],
            |row| {
                let min: Option<String> = row.get(0)?;
                let max: Option<String> = row.get(1)?;
                let count: i64 = row.get(2)?;
                Ok((min, max, count))
            },
        );

        match result {
            Ok((Some(min), Some(max), count)) => {
                let min = parse_row_date(&min).map_err(|e| BacksimError::DatabaseQuery {
                    reason: e.to_string(),
                })?;
                let max = parse_row_date(&max).map_err(|e| BacksimError::DatabaseQuery {
                    reason: e.to_string(),
                })?;
                Ok(Some((min, max, count as usize)))
            }
            Ok(_) => Ok(None),
            Err(e) => Err(BacksimError::DatabaseQuery {
                reason: e.to_string(),
            }),
        }
    }
}
