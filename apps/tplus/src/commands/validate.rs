use std::path::PathBuf;

pub(super) fn run_validate(config_path: PathBuf, strict: bool) -> Result<(), String> {
    let config = tplus_application::config::load_config(&config_path)?;
    super::common::print_config_summary("validate", &config, None);

    let deps = crate::infra::build_validate_deps(&config);
    let report =
        tplus_application::validation::validate(&config, strict, deps.market_data.as_ref())?;

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| format!("failed to render validation report: {err}"))?;
    println!("{rendered}");
    Ok(())
}
