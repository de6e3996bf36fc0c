use crate::config::Config;
use crate::shared::bar_query;
use std::time::Instant;
use tplus_domain::repositories::market_data::MarketDataRepository;
use tplus_domain::services::ohlcv::DataQualityReport;
use tracing::{info_span, warn};

/// Loads the run symbol's bars and reports what the loader had to clean up.
/// With `strict`, any dropped, merged or reordered row fails the check, as
/// does an empty series.
pub fn validate(
    config: &Config,
    strict: bool,
    market_data: &dyn MarketDataRepository,
) -> Result<serde_json::Value, String> {
    let _span = info_span!(
        "validate",
        strict = strict,
        run_id = %config.run.run_id,
        symbol = %config.run.symbol
    )
    .entered();

    config.validate()?;

    let stage_start = Instant::now();
    let query = bar_query(config, &config.run.symbol)?;
    let (bars, report) = market_data.load_bars(&query)?;
    metrics::histogram!("tplus.validate.load_bars_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    metrics::gauge!("tplus.validate.rows").set(report.rows as f64);
    metrics::gauge!("tplus.validate.duplicates").set(report.duplicates as f64);
    metrics::gauge!("tplus.validate.out_of_order").set(report.out_of_order as f64);
    metrics::gauge!("tplus.validate.invalid_close").set(report.invalid_close as f64);
    metrics::gauge!("tplus.validate.missing_open").set(report.missing_open as f64);

    if !report.is_clean() {
        warn!(
            duplicates = report.duplicates,
            out_of_order = report.out_of_order,
            invalid_close = report.invalid_close,
            missing_open = report.missing_open,
            "data quality issues found"
        );
    }

    if strict {
        if bars.is_empty() {
            return Err(format!(
                "strict validation failed: no bars for {}",
                config.run.symbol
            ));
        }
        if !report.is_clean() {
            return Err("strict validation failed: data quality issues found".to_string());
        }
    }

    Ok(serde_json::json!({
        "symbol": config.run.symbol,
        "source": query.csv_path.as_ref().map(|path| path.display().to_string()),
        "start": query.start.map(|d| d.to_string()),
        "end": query.end.map(|d| d.to_string()),
        "ohlcv": data_quality_json(&report),
        "clean": report.is_clean(),
        "strict": strict,
    }))
}

fn data_quality_json(report: &DataQualityReport) -> serde_json::Value {
    serde_json::json!({
        "rows": report.rows,
        "duplicates": report.duplicates,
        "out_of_order": report.out_of_order,
        "invalid_close": report.invalid_close,
        "missing_open": report.missing_open,
        "first_datetime": report.first_datetime.map(|dt| dt.to_string()),
        "last_datetime": report.last_datetime.map(|dt| dt.to_string()),
        "first_duplicate": report.first_duplicate.map(|dt| dt.to_string()),
        "first_out_of_order": report.first_out_of_order.map(|dt| dt.to_string()),
        "first_invalid_close": report.first_invalid_close,
    })
}
