use std::path::PathBuf;

pub(super) fn run_compare(config_path: PathBuf, out: Option<PathBuf>) -> Result<(), String> {
    let (config, config_toml) =
        tplus_application::config::load_config_with_source(&config_path)?;
    super::common::print_config_summary("compare", &config, out.as_ref());

    let overall_start = std::time::Instant::now();

    let crate::infra::EngineDeps {
        market_data,
        artifacts,
    } = crate::infra::build_engine_deps(&config);

    let report = tplus_application::compare::run_compare(
        &config,
        &config_toml,
        out,
        market_data.as_ref(),
        artifacts.as_ref(),
    )?;

    super::common::print_comparison_table(&report.rows);
    println!("compare output: {}", report.compare_dir.display());
    println!(
        "{} cli: compare variants={} total_ms={}",
        tplus_application::meta::engine_name(),
        report.rows.len(),
        overall_start.elapsed().as_millis()
    );
    Ok(())
}
