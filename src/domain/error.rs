//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for backsim.
#[derive(Debug, thiserror::Error)]
pub enum BacksimError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("no price data for {symbol} in the requested range")]
    DataUnavailable { symbol: String },

    #[error("held symbol {symbol} has no price on {date}")]
    MissingPrice { symbol: String, date: NaiveDate },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BacksimError> for std::process::ExitCode {
    fn from(err: &BacksimError) -> Self {
        let code: u8 = match err {
            BacksimError::Io(_) => 1,
            BacksimError::ConfigParse { .. }
            | BacksimError::ConfigMissing { .. }
            | BacksimError::ConfigInvalid { .. } => 2,
            BacksimError::Database { .. } | BacksimError::DatabaseQuery { .. } => 3,
            BacksimError::UnknownStrategy { .. } => 4,
            BacksimError::DataUnavailable { .. } | BacksimError::MissingPrice { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
