use crate::backtesting::{execute, write_outputs, RunLabels};
use crate::batch::{STATUS_FAILED, STATUS_NO_DATA, STATUS_OK};
use crate::config::{to_toml_pretty, Config, VariantConfig};
use crate::shared::{bar_query, build_engine_config, symbol_slug, timing_event};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tplus_domain::entities::sizing::SizingMethod;
use tplus_domain::repositories::artifacts::{ArtifactWriter, ComparisonRow};
use tplus_domain::repositories::market_data::MarketDataRepository;
use tplus_domain::services::audit::AuditEvent;
use tplus_domain::services::strategy::Strategy;
use tplus_domain::value_objects::bar::Bar;
use tracing::{info, info_span, warn};

#[derive(Debug, Clone)]
pub struct CompareReport {
    pub compare_dir: PathBuf,
    /// In `[[variants]]` declaration order.
    pub rows: Vec<ComparisonRow>,
}

struct LoadTiming {
    duration_ms: u64,
    rows: usize,
}

/// Runs every `[[variants]]` entry over the same bars of `run.symbol`. The
/// series is loaded once; each variant gets its own strategy and engine.
/// Per-variant artifacts land in `<out>/<run_id>/<variant>/`, the table in
/// `<out>/<run_id>/comparison_summary.csv`.
pub fn run_compare(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    market_data: &dyn MarketDataRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<CompareReport, String> {
    let variants = config.variants.as_deref().unwrap_or_default();
    if variants.is_empty() {
        return Err("[[variants]] must list at least one variant".to_string());
    }
    config.validate()?;

    let _span = info_span!(
        "run_compare",
        run_id = %config.run.run_id,
        symbol = %config.run.symbol,
        variants = variants.len()
    )
    .entered();

    let stage_start = Instant::now();
    let (bars, _data_report) = market_data.load_bars(&bar_query(config, &config.run.symbol)?)?;
    let load = LoadTiming {
        duration_ms: stage_start.elapsed().as_millis() as u64,
        rows: bars.len(),
    };
    metrics::histogram!("tplus.compare.load_bars_ms").record(load.duration_ms as f64);
    if bars.is_empty() {
        return Err(format!("no bars loaded for symbol {}", config.run.symbol));
    }

    let compare_dir = out
        .unwrap_or_else(|| PathBuf::from(&config.paths.out_dir))
        .join(&config.run.run_id);
    artifacts.ensure_dir(&compare_dir)?;

    let compare_start = Instant::now();
    let mut rows = Vec::with_capacity(variants.len());
    for variant in variants {
        let variant_config = config.with_variant(variant);
        let row = match run_variant(
            &variant_config,
            variant,
            &bars,
            &load,
            &compare_dir,
            artifacts,
        ) {
            Ok(row) => row,
            Err(err) => {
                warn!(variant = %variant.name, error = %err, "compare variant failed");
                metrics::counter!("tplus.compare.failed").increment(1);
                empty_row(variant, &variant_config, STATUS_FAILED)
            }
        };
        rows.push(row);
    }
    metrics::histogram!("tplus.compare.total_ms")
        .record(compare_start.elapsed().as_millis() as f64);

    artifacts.write_comparison_summary_csv(
        compare_dir.join("comparison_summary.csv").as_path(),
        &rows,
    )?;
    artifacts.write_config_snapshot_toml(
        compare_dir.join("config_snapshot.toml").as_path(),
        config_toml,
    )?;

    let ok = rows.iter().filter(|row| row.status == STATUS_OK).count();
    info!(variants = rows.len(), ok, compare_dir = %compare_dir.display(), "compare completed");
    Ok(CompareReport { compare_dir, rows })
}

fn run_variant(
    config: &Config,
    variant: &VariantConfig,
    bars: &[Bar],
    load: &LoadTiming,
    compare_dir: &Path,
    artifacts: &dyn ArtifactWriter,
) -> Result<ComparisonRow, String> {
    let _span = info_span!("compare_variant", variant = %variant.name).entered();
    let engine_config = build_engine_config(config)?;
    let symbol = config.run.symbol.as_str();
    let mut audit_extras: Vec<AuditEvent> = vec![timing_event(
        &config.run.run_id,
        Some(symbol),
        "load_bars",
        load.duration_ms,
        serde_json::json!({ "rows": load.rows, "shared": true }),
    )];

    let (results, strategy_name) = execute(
        &config.run.run_id,
        symbol,
        config,
        engine_config,
        bars.to_vec(),
        &mut audit_extras,
    )?;

    let row = match results.metrics.as_ref() {
        Some(m) => ComparisonRow {
            variant: variant.name.clone(),
            strategy: strategy_name.clone(),
            sizing: sizing_label(config)?,
            status: STATUS_OK.to_string(),
            total_return: Some(m.total_return),
            annualized_return: Some(m.annualized_return),
            sharpe_ratio: Some(m.sharpe_ratio),
            max_drawdown: Some(m.max_drawdown),
            number_of_trades: Some(m.number_of_trades),
            win_rate: Some(m.win_rate),
            final_capital: Some(m.final_capital),
        },
        None => empty_row(variant, config, STATUS_NO_DATA),
    };

    let variant_toml = to_toml_pretty(config)?;
    write_outputs(
        &compare_dir.join(symbol_slug(&variant.name)),
        RunLabels {
            run_id: &config.run.run_id,
            symbol,
            strategy: &strategy_name,
        },
        config,
        &variant_toml,
        &engine_config,
        results,
        artifacts,
        audit_extras,
    )?;
    Ok(row)
}

fn sizing_label(config: &Config) -> Result<String, String> {
    let label = match build_engine_config(config)?.sizing.method {
        SizingMethod::AllIn => "all_in",
        SizingMethod::FixedFraction { .. } => "fixed_fraction",
        SizingMethod::FixedCash { .. } => "fixed_cash",
    };
    Ok(label.to_string())
}

fn empty_row(variant: &VariantConfig, config: &Config, status: &str) -> ComparisonRow {
    let strategy = crate::shared::build_strategy(config)
        .map(|strategy| strategy.name().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    ComparisonRow {
        variant: variant.name.clone(),
        strategy,
        sizing: sizing_label(config).unwrap_or_else(|_| "unknown".to_string()),
        status: status.to_string(),
        total_return: None,
        annualized_return: None,
        sharpe_ratio: None,
        max_drawdown: None,
        number_of_trades: None,
        win_rate: None,
        final_capital: None,
    }
}
