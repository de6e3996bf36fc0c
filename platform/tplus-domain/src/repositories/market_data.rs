use crate::services::ohlcv::DataQualityReport;
use crate::value_objects::bar::Bar;
use chrono::NaiveDate;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BarQuery {
    pub symbol: String,
    /// Explicit file; when `None` the adapter resolves one from `symbol`.
    pub csv_path: Option<PathBuf>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Returns bars sorted ascending with unique datetimes, plus what was dropped
/// or merged on the way. A symbol without data yields an empty vector, not an
/// error.
pub trait MarketDataRepository {
    fn load_bars(&self, query: &BarQuery) -> Result<(Vec<Bar>, DataQualityReport), String>;
}
