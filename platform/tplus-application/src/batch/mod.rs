use crate::backtesting::{execute, write_outputs, RunLabels};
use crate::config::{to_toml_pretty, Config};
use crate::shared::{bar_query, build_engine_config, symbol_slug, timing_event};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tplus_domain::repositories::artifacts::{ArtifactWriter, BatchSummaryRow};
use tplus_domain::repositories::market_data::MarketDataRepository;
use tplus_domain::services::audit::AuditEvent;
use tplus_domain::services::engine::config::EngineConfig;
use tracing::{info, info_span, warn};

pub const STATUS_OK: &str = "ok";
pub const STATUS_NO_DATA: &str = "no_data";
pub const STATUS_FAILED: &str = "failed";

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_dir: PathBuf,
    /// Sorted by total return, best first; rows without metrics last.
    pub rows: Vec<BatchSummaryRow>,
}

/// Backtests every symbol in `batch.symbols` one after another, each with its
/// own engine and strategy. Per-symbol artifacts land in
/// `<out>/<run_id>/<symbol>/`, the summary in `<out>/<run_id>/batch_summary.csv`.
pub fn run_batch(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    market_data: &dyn MarketDataRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<BatchReport, String> {
    let symbols: Vec<String> = config
        .batch
        .as_ref()
        .map(|batch| batch.symbols.clone())
        .unwrap_or_default();
    if symbols.is_empty() {
        return Err("batch.symbols must list at least one symbol".to_string());
    }

    let _span = info_span!(
        "run_batch",
        run_id = %config.run.run_id,
        symbols = symbols.len()
    )
    .entered();

    let engine_config = build_engine_config(config)?;
    let batch_dir = out
        .unwrap_or_else(|| PathBuf::from(&config.paths.out_dir))
        .join(&config.run.run_id);
    artifacts.ensure_dir(&batch_dir)?;

    let batch_start = Instant::now();
    let mut rows = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let row = match run_symbol(
            config,
            symbol,
            &batch_dir,
            engine_config,
            market_data,
            artifacts,
        ) {
            Ok(row) => row,
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "batch symbol failed");
                metrics::counter!("tplus.batch.failed").increment(1);
                empty_row(symbol, STATUS_FAILED)
            }
        };
        rows.push(row);
    }
    metrics::histogram!("tplus.batch.total_ms").record(batch_start.elapsed().as_millis() as f64);

    rows.sort_by(compare_rows);
    artifacts.write_batch_summary_csv(batch_dir.join("batch_summary.csv").as_path(), &rows)?;
    artifacts.write_config_snapshot_toml(
        batch_dir.join("config_snapshot.toml").as_path(),
        config_toml,
    )?;

    let ok = rows.iter().filter(|row| row.status == STATUS_OK).count();
    info!(symbols = rows.len(), ok, batch_dir = %batch_dir.display(), "batch completed");
    Ok(BatchReport { batch_dir, rows })
}

fn run_symbol(
    config: &Config,
    symbol: &str,
    batch_dir: &Path,
    engine_config: EngineConfig,
    market_data: &dyn MarketDataRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<BatchSummaryRow, String> {
    let _span = info_span!("batch_symbol", symbol = %symbol).entered();
    let run_id = format!("{}_{}", config.run.run_id, symbol_slug(symbol));
    let mut audit_extras: Vec<AuditEvent> = Vec::new();

    let stage_start = Instant::now();
    let (bars, data_report) = market_data.load_bars(&bar_query(config, symbol)?)?;
    metrics::histogram!("tplus.backtest.load_bars_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    if bars.is_empty() {
        warn!(symbol = %symbol, "no bars for symbol, skipped");
        metrics::counter!("tplus.batch.skipped").increment(1);
        return Ok(empty_row(symbol, STATUS_NO_DATA));
    }
    audit_extras.push(timing_event(
        &run_id,
        Some(symbol),
        "load_bars",
        stage_start.elapsed().as_millis() as u64,
        serde_json::json!({
            "rows": bars.len(),
            "duplicates": data_report.duplicates,
            "invalid_close": data_report.invalid_close,
        }),
    ));

    let (results, strategy_name) = execute(
        &run_id,
        symbol,
        config,
        engine_config,
        bars,
        &mut audit_extras,
    )?;

    let row = match results.metrics.as_ref() {
        Some(m) => BatchSummaryRow {
            symbol: symbol.to_string(),
            status: STATUS_OK.to_string(),
            total_return: Some(m.total_return),
            annualized_return: Some(m.annualized_return),
            sharpe_ratio: Some(m.sharpe_ratio),
            max_drawdown: Some(m.max_drawdown),
            number_of_trades: Some(m.number_of_trades),
            win_rate: Some(m.win_rate),
        },
        None => empty_row(symbol, STATUS_NO_DATA),
    };

    // Each symbol directory carries a snapshot that reproduces just that run.
    let mut symbol_config = config.clone();
    symbol_config.run.run_id = run_id.clone();
    symbol_config.run.symbol = symbol.to_string();
    symbol_config.batch = None;
    symbol_config.variants = None;
    if symbol != config.run.symbol {
        if let Some(data) = symbol_config.data.as_mut() {
            data.csv_path = None;
        }
    }
    let symbol_toml = to_toml_pretty(&symbol_config)?;

    write_outputs(
        &batch_dir.join(symbol_slug(symbol)),
        RunLabels {
            run_id: &run_id,
            symbol,
            strategy: &strategy_name,
        },
        &symbol_config,
        &symbol_toml,
        &engine_config,
        results,
        artifacts,
        audit_extras,
    )?;
    Ok(row)
}

fn empty_row(symbol: &str, status: &str) -> BatchSummaryRow {
    BatchSummaryRow {
        symbol: symbol.to_string(),
        status: status.to_string(),
        total_return: None,
        annualized_return: None,
        sharpe_ratio: None,
        max_drawdown: None,
        number_of_trades: None,
        win_rate: None,
    }
}

fn compare_rows(a: &BatchSummaryRow, b: &BatchSummaryRow) -> Ordering {
    match (a.total_return, b.total_return) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.symbol.cmp(&b.symbol),
    }
}
