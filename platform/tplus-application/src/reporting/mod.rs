use crate::config::{load_config_from_str, Config};
use crate::shared::{
    build_engine_config, build_strategy, config_snapshot_json, summary_meta_json,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tplus_domain::entities::metrics::{PerformanceAnalyzer, PerformanceMetrics};
use tplus_domain::repositories::artifacts::{ArtifactReader, ArtifactWriter};
use tplus_domain::services::audit::AuditEvent;
use tplus_domain::services::strategy::Strategy;
use tracing::{info_span, warn};

pub struct GenerateReportResult {
    pub input_dir: PathBuf,
    pub run_id: String,
    pub metrics: Option<PerformanceMetrics>,
    pub bars_processed: usize,
    pub wrote_html: bool,
}

impl GenerateReportResult {
    /// Label/value pairs ready for a terminal table.
    pub fn formatted_rows(&self) -> Vec<(&'static str, String)> {
        self.metrics
            .as_ref()
            .map(|metrics| metrics.report_rows())
            .unwrap_or_default()
    }
}

/// Recomputes metrics from a run directory's `history.csv` and `trades.csv`
/// and rewrites `summary.json`. The config snapshot, when present and still
/// parseable, supplies run labels and the risk-free rate. With HTML enabled
/// the dashboard is redrawn too; fill markers come from `executions.csv` when
/// that file exists.
pub fn generate_report(
    input_dir: &Path,
    reader: &dyn ArtifactReader,
    writer: &dyn ArtifactWriter,
) -> Result<GenerateReportResult, String> {
    let _span = info_span!("generate_report", input_dir = %input_dir.display()).entered();

    let stage_start = Instant::now();
    let history_path = input_dir.join("history.csv");
    let trades_path = input_dir.join("trades.csv");
    let config_path = input_dir.join("config_snapshot.toml");

    if !reader.exists(&history_path) || !reader.exists(&trades_path) {
        return Err(format!(
            "missing history.csv or trades.csv in {}",
            input_dir.display()
        ));
    }

    let history = reader.read_history_csv(&history_path)?;
    let trades = reader.read_trades_csv(&trades_path)?;
    let executions_path = input_dir.join("executions.csv");
    let executions = if reader.exists(&executions_path) {
        reader.read_executions_csv(&executions_path)?
    } else {
        Vec::new()
    };

    let config_toml = reader.read_config_snapshot_toml(&config_path)?;
    let config = config_toml.as_deref().and_then(|raw| {
        load_config_from_str(raw)
            .map_err(|err| warn!(error = %err, "config snapshot unreadable, using defaults"))
            .ok()
    });

    let risk_free_rate = config
        .as_ref()
        .and_then(|config| build_engine_config(config).ok())
        .map(|engine| engine.risk_free_rate)
        .unwrap_or(0.0);
    let equity: Vec<f64> = history.iter().map(|point| point.total_assets).collect();
    let metrics = PerformanceAnalyzer::new(risk_free_rate).calculate_metrics(&equity, &trades);
    metrics::histogram!("tplus.report.generate_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    metrics::gauge!("tplus.report.closed_trades").set(trades.len() as f64);
    metrics::gauge!("tplus.report.bars_processed").set(history.len() as f64);

    let (run_id, meta, config_snapshot, wrote_html) = match (&config, config_toml.as_deref()) {
        (Some(config), Some(raw)) => {
            let strategy = strategy_label(config);
            let meta = summary_meta_json(
                &config.run.run_id,
                &config.run.symbol,
                &strategy,
                &history,
            );
            let snapshot = build_engine_config(config)
                .ok()
                .map(|engine| config_snapshot_json(config, &engine, raw));
            (
                config.run.run_id.clone(),
                meta,
                snapshot,
                config.html_report(),
            )
        }
        _ => ("unknown".to_string(), None, None, false),
    };

    writer.write_summary_json(
        input_dir.join("summary.json").as_path(),
        metrics.as_ref(),
        meta.as_ref(),
        config_snapshot.as_ref(),
    )?;

    if wrote_html {
        writer.write_summary_html(
            input_dir.join("summary.html").as_path(),
            metrics.as_ref(),
            meta.as_ref(),
        )?;
        writer.write_dashboard_html(
            input_dir.join("dashboard.html").as_path(),
            metrics.as_ref(),
            meta.as_ref(),
            &history,
            &executions,
        )?;
    }

    let events = build_report_events(
        &run_id,
        metrics.as_ref(),
        history.len(),
        trades.len(),
        input_dir,
    );
    writer.write_audit_jsonl(input_dir.join("report_logs.jsonl").as_path(), &events)?;

    Ok(GenerateReportResult {
        input_dir: input_dir.to_path_buf(),
        run_id,
        metrics,
        bars_processed: history.len(),
        wrote_html,
    })
}

fn strategy_label(config: &Config) -> String {
    build_strategy(config)
        .map(|strategy| strategy.name().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn build_report_events(
    run_id: &str,
    metrics: Option<&PerformanceMetrics>,
    bars: usize,
    trades: usize,
    input_dir: &Path,
) -> Vec<AuditEvent> {
    vec![
        AuditEvent {
            run_id: run_id.to_string(),
            datetime: None,
            stage: "report".to_string(),
            symbol: None,
            action: "recompute".to_string(),
            error: None,
            details: serde_json::json!({
                "input_dir": input_dir.display().to_string(),
                "bars_processed": bars,
                "closed_trades": trades,
            }),
        },
        AuditEvent {
            run_id: run_id.to_string(),
            datetime: None,
            stage: "summary".to_string(),
            symbol: None,
            action: "complete".to_string(),
            error: None,
            details: serde_json::json!({ "metrics": metrics }),
        },
    ]
}
