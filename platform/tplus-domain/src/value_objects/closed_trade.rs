use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A sell paired against the average cost basis held at the time of the sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub datetime: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: u64,
    pub pnl: f64,
    pub return_pct: f64,
}
