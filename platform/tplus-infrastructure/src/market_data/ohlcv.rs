use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tplus_domain::repositories::market_data::{BarQuery, MarketDataRepository};
use tplus_domain::services::ohlcv::{filter_date_range, DataQualityReport};
use tplus_domain::value_objects::bar::Bar;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct BarRecord {
    #[serde(alias = "datetime", alias = "date", alias = "timestamp")]
    time: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    open: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    high: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    low: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    volume: Option<f64>,
}

/// Reads an OHLCV file into sorted, de-duplicated bars.
///
/// Rows without a positive close are dropped. A missing open is kept as NaN so
/// the engine can skip fills on that bar. Later rows win over earlier rows with
/// the same datetime.
pub fn load_csv(path: &Path) -> Result<(Vec<Bar>, DataQualityReport), String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open OHLCV CSV {}: {}", path.display(), err))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut bars_by_datetime: BTreeMap<NaiveDateTime, Bar> = BTreeMap::new();
    let mut report = DataQualityReport::default();
    let mut last_seen: Option<NaiveDateTime> = None;

    for (index, result) in reader.deserialize::<BarRecord>().enumerate() {
        let record = result.map_err(|err| {
            format!("failed to parse CSV row {} in {}: {}", index, path.display(), err)
        })?;
        let datetime = parse_datetime(&record.time)
            .map_err(|err| format!("{}: row {}: {}", path.display(), index, err))?;

        let close = match record.close {
            Some(close) if close.is_finite() && close > 0.0 => close,
            _ => {
                report.invalid_close += 1;
                report.first_invalid_close.get_or_insert(index);
                continue;
            }
        };

        let open = match record.open {
            Some(open) if open.is_finite() => open,
            _ => {
                report.missing_open += 1;
                f64::NAN
            }
        };

        if let Some(prev) = last_seen {
            if datetime < prev {
                report.out_of_order += 1;
                report.first_out_of_order.get_or_insert(datetime);
            }
        }
        last_seen = Some(datetime);

        let bar = Bar {
            datetime,
            open,
            high: record.high.unwrap_or(f64::NAN),
            low: record.low.unwrap_or(f64::NAN),
            close,
            volume: record.volume.unwrap_or(0.0),
        };
        if bars_by_datetime.insert(datetime, bar).is_some() {
            report.duplicates += 1;
            report.first_duplicate.get_or_insert(datetime);
        }
    }

    let bars: Vec<Bar> = bars_by_datetime.into_values().collect();
    report.rows = bars.len();
    report.first_datetime = bars.first().map(|bar| bar.datetime);
    report.last_datetime = bars.last().map(|bar| bar.datetime);
    Ok((bars, report))
}

/// Accepts RFC 3339 (wall-clock time kept, offset dropped), ISO-like
/// date-times, plain dates and compact `YYYYMMDD[HHMMSS]` stamps.
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%d%H%M%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    for format in ["%Y-%m-%d", "%Y%m%d"] {
        if let Some(dt) = NaiveDate::parse_from_str(value, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Ok(dt);
        }
    }
    Err(format!("unsupported datetime format: '{}'", value))
}

/// `510300.SH` -> `510300_SH.csv`
pub fn symbol_file_name(symbol: &str) -> String {
    format!("{}.csv", symbol.replace('.', "_"))
}

/// Serves bars from per-symbol CSV files under `data_dir`, or from an explicit
/// path carried by the query.
#[derive(Debug, Clone)]
pub struct CsvMarketDataRepository {
    data_dir: PathBuf,
}

impl CsvMarketDataRepository {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn resolve_path(&self, query: &BarQuery) -> PathBuf {
        query
            .csv_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(symbol_file_name(&query.symbol)))
    }
}

impl MarketDataRepository for CsvMarketDataRepository {
    fn load_bars(&self, query: &BarQuery) -> Result<(Vec<Bar>, DataQualityReport), String> {
        let path = self.resolve_path(query);
        if query.csv_path.is_none() && !path.exists() {
            warn!(symbol = %query.symbol, path = %path.display(), "no data file for symbol");
            return Ok((Vec::new(), DataQualityReport::default()));
        }

        let started = Instant::now();
        let (bars, mut report) = load_csv(&path)?;
        metrics::histogram!("tplus.data.load_csv_ms").record(started.elapsed().as_millis() as f64);
        metrics::counter!("tplus.data.rows_dropped").increment(report.invalid_close as u64);

        let loaded = bars.len();
        let bars = filter_date_range(bars, query.start, query.end);
        report.rows = bars.len();
        report.first_datetime = bars.first().map(|bar| bar.datetime);
        report.last_datetime = bars.last().map(|bar| bar.datetime);
        debug!(
            symbol = %query.symbol,
            path = %path.display(),
            loaded,
            kept = bars.len(),
            duplicates = report.duplicates,
            invalid_close = report.invalid_close,
            "bars loaded"
        );
        Ok((bars, report))
    }
}

#[cfg(test)]
mod tests {
    use super::{load_csv, parse_datetime, CsvMarketDataRepository};
    use chrono::NaiveDate;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tplus_domain::repositories::market_data::{BarQuery, MarketDataRepository};

    fn unique_tmp_path(name: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("tplus_{name}_{}_{}", std::process::id(), now))
    }

    #[test]
    fn parses_supported_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("datetime");
        assert_eq!(parse_datetime("2024-01-02 09:30:00"), Ok(expected));
        assert_eq!(parse_datetime("2024-01-02T09:30:00"), Ok(expected));
        assert_eq!(parse_datetime("2024-01-02T09:30:00+08:00"), Ok(expected));
        assert_eq!(parse_datetime("20240102093000"), Ok(expected));

        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("datetime");
        assert_eq!(parse_datetime("2024-01-02"), Ok(midnight));
        assert_eq!(parse_datetime("20240102"), Ok(midnight));
        assert!(parse_datetime("02/01/2024").is_err());
    }

    #[test]
    fn load_csv_cleans_and_counts() {
        let path = unique_tmp_path("ohlcv_clean.csv");
        let csv_data = "date,open,high,low,close,volume\n\
2024-01-03,11,11,11,11,100\n\
2024-01-02,10,10,10,10,100\n\
2024-01-04,,12,12,12,100\n\
2024-01-05,13,13,13,,100\n\
2024-01-06,14,14,14,0,100\n\
2024-01-03,15,15,15,15,200\n";
        fs::write(&path, csv_data).expect("write csv");

        let (bars, report) = load_csv(&path).expect("load csv");
        assert_eq!(bars.len(), 3);
        assert!(bars.windows(2).all(|w| w[0].datetime < w[1].datetime));
        assert_eq!(report.rows, 3);
        assert_eq!(report.invalid_close, 2);
        assert_eq!(report.first_invalid_close, Some(3));
        assert_eq!(report.missing_open, 1);
        assert!(bars[2].open.is_nan());
        assert_eq!(report.duplicates, 1);
        // Last row wins on duplicates.
        assert_eq!(bars[1].close, 15.0);
        assert_eq!(bars[1].volume, 200.0);
        assert_eq!(report.out_of_order, 2);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_csv_accepts_time_column_without_volume() {
        let path = unique_tmp_path("ohlcv_time.csv");
        let csv_data = "time,open,high,low,close\n\
2024-01-02 15:00:00,10,10,10,10\n";
        fs::write(&path, csv_data).expect("write csv");

        let (bars, _) = load_csv(&path).expect("load csv");
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 0.0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn bad_datetime_reports_the_row() {
        let path = unique_tmp_path("ohlcv_bad_dt.csv");
        let csv_data = "datetime,open,high,low,close,volume\n\
2024-01-02,10,10,10,10,1\n\
not-a-date,10,10,10,10,1\n";
        fs::write(&path, csv_data).expect("write csv");

        let err = load_csv(&path).expect_err("bad datetime");
        assert!(err.contains("row 1"), "{err}");
        assert!(err.contains("not-a-date"), "{err}");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn repository_resolves_symbol_files_and_filters_dates() {
        let dir = unique_tmp_path("ohlcv_repo");
        fs::create_dir_all(&dir).expect("dir");
        let csv_data = "date,open,high,low,close,volume\n\
2024-01-02,10,10,10,10,1\n\
2024-01-03,10,10,10,10,1\n\
2024-01-04,10,10,10,10,1\n";
        fs::write(dir.join("510300_SH.csv"), csv_data).expect("write csv");

        let repo = CsvMarketDataRepository::new(&dir);
        let (bars, report) = repo
            .load_bars(&BarQuery {
                symbol: "510300.SH".to_string(),
                csv_path: None,
                start: NaiveDate::from_ymd_opt(2024, 1, 3),
                end: None,
            })
            .expect("load");
        assert_eq!(bars.len(), 2);
        assert_eq!(report.rows, 2);

        let (missing, _) = repo
            .load_bars(&BarQuery {
                symbol: "000001.SZ".to_string(),
                csv_path: None,
                start: None,
                end: None,
            })
            .expect("missing symbol is empty");
        assert!(missing.is_empty());

        let explicit = repo.load_bars(&BarQuery {
            symbol: "000001.SZ".to_string(),
            csv_path: Some(dir.join("nope.csv")),
            start: None,
            end: None,
        });
        assert!(explicit.is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
