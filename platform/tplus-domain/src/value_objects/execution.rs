use crate::value_objects::side::Side;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single fill. `commission` includes stamp duty on sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub datetime: NaiveDateTime,
    pub side: Side,
    pub price: f64,
    pub quantity: u64,
    pub commission: f64,
}
