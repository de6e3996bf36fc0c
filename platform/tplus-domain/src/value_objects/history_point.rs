use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub datetime: NaiveDateTime,
    pub cash: f64,
    pub position: u64,
    pub close: f64,
    pub total_assets: f64,
}
