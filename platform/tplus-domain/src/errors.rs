use chrono::NaiveDateTime;
use thiserror::Error;

/// Input-contract violations that abort a backtest before any bar is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("no bars to backtest")]
    EmptyBars,
    #[error("duplicate bar datetime {datetime} at index {index}")]
    DuplicateTimestamp {
        index: usize,
        datetime: NaiveDateTime,
    },
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}
