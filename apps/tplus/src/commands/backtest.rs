use std::path::PathBuf;

pub(super) fn run_backtest(config_path: PathBuf, out: Option<PathBuf>) -> Result<(), String> {
    let (config, config_toml) =
        tplus_application::config::load_config_with_source(&config_path)?;
    super::common::print_config_summary("backtest", &config, out.as_ref());

    let overall_start = std::time::Instant::now();

    let crate::infra::EngineDeps {
        market_data,
        artifacts,
    } = crate::infra::build_engine_deps(&config);

    let report = tplus_application::backtesting::run_backtest(
        &config,
        &config_toml,
        out,
        market_data.as_ref(),
        artifacts.as_ref(),
    )?;

    println!(
        "bars={}, executions={}",
        report.bars_processed, report.executions
    );
    let rows = report
        .metrics
        .as_ref()
        .map(|metrics| metrics.report_rows())
        .unwrap_or_default();
    super::common::print_metrics_table(&rows);
    println!("run output: {}", report.run_dir.display());
    println!(
        "{} cli: backtest total_ms={}",
        tplus_application::meta::engine_name(),
        overall_start.elapsed().as_millis()
    );
    Ok(())
}
