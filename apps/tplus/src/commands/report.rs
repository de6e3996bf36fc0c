use std::path::PathBuf;

pub(super) fn run_report(input: PathBuf) -> Result<(), String> {
    let deps = crate::infra::build_reporting_deps();
    let result = tplus_application::reporting::generate_report(
        input.as_path(),
        deps.reader.as_ref(),
        deps.writer.as_ref(),
    )?;
    println!(
        "{} cli: report regenerated (run_id={}, bars={}, html={})",
        tplus_application::meta::engine_name(),
        result.run_id,
        result.bars_processed,
        result.wrote_html
    );
    super::common::print_metrics_table(&result.formatted_rows());
    Ok(())
}
