use thiserror::Error;

/// Errors raised by strategies, their plumbing and the data loaders
#[derive(Debug, Error)]
pub enum StrategyError {
    /// A signal was recorded at a bar index that does not advance the window
    #[error("bar index {index} must be greater than last recorded index {last}")]
    NonMonotonicIndex { last: u64, index: u64 },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("rank data missing for {symbol} on {date}")]
    MissingRankData { symbol: String, date: String },

    #[error("unknown strategy class `{0}`")]
    UnknownStrategy(String),

    #[error("invalid bar data: {0}")]
    InvalidBarData(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StrategyError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        StrategyError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
