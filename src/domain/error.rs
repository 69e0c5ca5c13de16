//! Domain error types.
//!
//! Per-symbol failures (`DataUnavailable`, `AmbiguousInput`) are non-fatal:
//! the affected security is skipped for the round and the loop continues.
//! Configuration errors and an empty value history at run end are the only
//! run-level fatal conditions. Gate rejections and cash-skipped buys are
//! recorded outcomes, not errors.

/// Top-level error type for valuesim.
#[derive(Debug, thiserror::Error)]
pub enum ValuesimError {
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

    #[error("no point-in-time data for {symbol} as of {as_of}")]
    DataUnavailable { symbol: String, as_of: String },

    #[error("ambiguous input for {symbol}: {field} ({reason})")]
    AmbiguousInput {
        symbol: String,
        field: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error("backtest produced no value history")]
    EmptyHistory,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ValuesimError> for std::process::ExitCode {
    fn from(err: &ValuesimError) -> Self {
        let code: u8 = match err {
            ValuesimError::Io(_) => 1,
            ValuesimError::ConfigParse { .. }
            | ValuesimError::ConfigMissing { .. }
            | ValuesimError::ConfigInvalid { .. } => 2,
            ValuesimError::DataSource { .. } | ValuesimError::Report { .. } => 3,
            ValuesimError::DataUnavailable { .. } | ValuesimError::AmbiguousInput { .. } => 4,
            ValuesimError::EmptyHistory => 5,
        };
        std::process::ExitCode::from(code)
    }
}
