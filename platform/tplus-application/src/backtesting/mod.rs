use crate::config::Config;
use crate::shared::{
    bar_query, build_engine_config, build_strategy, config_snapshot_json, summary_meta_json,
    timing_event,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tplus_domain::entities::metrics::PerformanceMetrics;
use tplus_domain::repositories::artifacts::ArtifactWriter;
use tplus_domain::repositories::market_data::MarketDataRepository;
use tplus_domain::services::audit::AuditEvent;
use tplus_domain::services::engine::backtest::{BacktestResults, Backtester};
use tplus_domain::services::engine::config::EngineConfig;
use tplus_domain::services::strategy::Strategy;
use tplus_domain::value_objects::bar::Bar;
use tracing::{info, info_span};

#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub run_dir: PathBuf,
    pub metrics: Option<PerformanceMetrics>,
    pub bars_processed: usize,
    pub executions: usize,
}

pub fn run_backtest(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    market_data: &dyn MarketDataRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<BacktestReport, String> {
    let _span = info_span!(
        "run_backtest",
        run_id = %config.run.run_id,
        symbol = %config.run.symbol
    )
    .entered();

    let engine_config = build_engine_config(config)?;
    let query = bar_query(config, &config.run.symbol)?;
    let mut audit_extras: Vec<AuditEvent> = Vec::new();

    let stage_start = Instant::now();
    let (bars, data_report) = market_data.load_bars(&query)?;
    metrics::histogram!("tplus.backtest.load_bars_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    audit_extras.push(timing_event(
        &config.run.run_id,
        Some(&config.run.symbol),
        "load_bars",
        stage_start.elapsed().as_millis() as u64,
        serde_json::json!({
            "rows": bars.len(),
            "duplicates": data_report.duplicates,
            "out_of_order": data_report.out_of_order,
            "invalid_close": data_report.invalid_close,
            "missing_open": data_report.missing_open,
        }),
    ));
    if bars.is_empty() {
        return Err(format!("no bars loaded for symbol {}", config.run.symbol));
    }

    let (results, strategy_name) = execute(
        &config.run.run_id,
        &config.run.symbol,
        config,
        engine_config,
        bars,
        &mut audit_extras,
    )?;

    let run_dir = out
        .unwrap_or_else(|| PathBuf::from(&config.paths.out_dir))
        .join(&config.run.run_id);
    let report = BacktestReport {
        run_dir: run_dir.clone(),
        metrics: results.metrics.clone(),
        bars_processed: results.history.len(),
        executions: results.all_trades.len(),
    };
    write_outputs(
        &run_dir,
        RunLabels {
            run_id: &config.run.run_id,
            symbol: &config.run.symbol,
            strategy: &strategy_name,
        },
        config,
        config_toml,
        &engine_config,
        results,
        artifacts,
        audit_extras,
    )?;
    info!(run_dir = %run_dir.display(), "backtest artifacts written");
    Ok(report)
}

/// Runs one symbol through a fresh strategy and engine, recording stage
/// timings. Returns the results and the strategy name.
pub(crate) fn execute(
    run_id: &str,
    symbol: &str,
    config: &Config,
    engine_config: EngineConfig,
    bars: Vec<Bar>,
    audit_extras: &mut Vec<AuditEvent>,
) -> Result<(BacktestResults, String), String> {
    let strategy = build_strategy(config)?;
    let strategy_name = strategy.name().to_string();

    let stage_start = Instant::now();
    let mut engine = Backtester::new(run_id.to_string(), strategy, engine_config)
        .map_err(|err| err.to_string())?
        .with_symbol(symbol);
    engine
        .run(bars)
        .map_err(|err| format!("backtest failed for {symbol}: {err}"))?;
    let results = engine.get_results();

    let engine_ms = stage_start.elapsed().as_millis() as f64;
    metrics::histogram!("tplus.backtest.engine_ms").record(engine_ms);
    metrics::gauge!("tplus.backtest.bars_processed").set(results.history.len() as f64);
    metrics::gauge!("tplus.backtest.executions").set(results.all_trades.len() as f64);
    metrics::gauge!("tplus.backtest.closed_trades").set(results.trades.len() as f64);
    metrics::gauge!("tplus.backtest.engine_bars_per_sec").set(if engine_ms > 0.0 {
        (results.history.len() as f64) / (engine_ms / 1000.0)
    } else {
        0.0
    });
    audit_extras.push(timing_event(
        run_id,
        Some(symbol),
        "run_engine",
        stage_start.elapsed().as_millis() as u64,
        serde_json::json!({ "strategy": strategy_name }),
    ));

    Ok((results, strategy_name))
}

pub(crate) struct RunLabels<'a> {
    pub run_id: &'a str,
    pub symbol: &'a str,
    pub strategy: &'a str,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn write_outputs(
    run_dir: &Path,
    labels: RunLabels<'_>,
    config: &Config,
    config_toml: &str,
    engine_config: &EngineConfig,
    results: BacktestResults,
    artifacts: &dyn ArtifactWriter,
    mut audit_extras: Vec<AuditEvent>,
) -> Result<(), String> {
    artifacts.ensure_dir(run_dir)?;

    artifacts.write_history_csv(run_dir.join("history.csv").as_path(), &results.history)?;
    artifacts.write_trades_csv(run_dir.join("trades.csv").as_path(), &results.trades)?;
    artifacts.write_executions_csv(
        run_dir.join("executions.csv").as_path(),
        &results.all_trades,
    )?;

    let meta = summary_meta_json(
        labels.run_id,
        labels.symbol,
        labels.strategy,
        &results.history,
    );
    let config_snapshot = config_snapshot_json(config, engine_config, config_toml);
    artifacts.write_summary_json(
        run_dir.join("summary.json").as_path(),
        results.metrics.as_ref(),
        meta.as_ref(),
        Some(&config_snapshot),
    )?;

    if config.html_report() {
        artifacts.write_summary_html(
            run_dir.join("summary.html").as_path(),
            results.metrics.as_ref(),
            meta.as_ref(),
        )?;
        artifacts.write_dashboard_html(
            run_dir.join("dashboard.html").as_path(),
            results.metrics.as_ref(),
            meta.as_ref(),
            &results.history,
            &results.all_trades,
        )?;
    }

    // Engine events are already in bar order; stage timings follow them.
    let mut audit_events = results.audit_events;
    audit_events.append(&mut audit_extras);
    artifacts.write_audit_jsonl(run_dir.join("logs.jsonl").as_path(), &audit_events)?;

    artifacts
        .write_config_snapshot_toml(run_dir.join("config_snapshot.toml").as_path(), config_toml)?;

    Ok(())
}
