use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One OHLCV bar. Prices that are missing upstream are carried as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub datetime: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.datetime.date()
    }
}
