use crate::reporting;
use std::fs;
use std::path::Path;
use tplus_domain::entities::metrics::PerformanceMetrics;
use tplus_domain::repositories::artifacts::{
    ArtifactReader, ArtifactWriter, BatchSummaryRow, ComparisonRow,
};
use tplus_domain::services::audit::AuditEvent;
use tplus_domain::value_objects::closed_trade::ClosedTrade;
use tplus_domain::value_objects::execution::ExecutionRecord;
use tplus_domain::value_objects::history_point::HistoryPoint;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

fn parse_summary_meta(meta: &serde_json::Value) -> Option<reporting::SummaryMeta> {
    let field = |name: &str| meta.get(name)?.as_str().map(|s| s.to_string());
    Some(reporting::SummaryMeta {
        run_id: field("run_id")?,
        symbol: field("symbol")?,
        strategy: field("strategy").unwrap_or_else(|| "unknown".to_string()),
        start: field("start")?,
        end: field("end")?,
    })
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err))
    }

    fn write_history_csv(&self, path: &Path, points: &[HistoryPoint]) -> Result<(), String> {
        reporting::write_history_csv(path, points)
    }

    fn write_trades_csv(&self, path: &Path, trades: &[ClosedTrade]) -> Result<(), String> {
        reporting::write_trades_csv(path, trades)
    }

    fn write_executions_csv(
        &self,
        path: &Path,
        executions: &[ExecutionRecord],
    ) -> Result<(), String> {
        reporting::write_executions_csv(path, executions)
    }

    fn write_summary_json(
        &self,
        path: &Path,
        metrics: Option<&PerformanceMetrics>,
        meta: Option<&serde_json::Value>,
        config_snapshot: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        let parsed = meta.and_then(parse_summary_meta);
        reporting::write_summary_json(path, metrics, parsed.as_ref(), config_snapshot)
    }

    fn write_summary_html(
        &self,
        path: &Path,
        metrics: Option<&PerformanceMetrics>,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        let parsed = meta.and_then(parse_summary_meta);
        reporting::write_summary_html(path, metrics, parsed.as_ref())
    }

    fn write_dashboard_html(
        &self,
        path: &Path,
        metrics: Option<&PerformanceMetrics>,
        meta: Option<&serde_json::Value>,
        history: &[HistoryPoint],
        executions: &[ExecutionRecord],
    ) -> Result<(), String> {
        let parsed = meta.and_then(parse_summary_meta);
        reporting::write_dashboard_html(path, metrics, parsed.as_ref(), history, executions)
    }

    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String> {
        reporting::write_audit_jsonl(path, events)
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        fs::write(path, contents).map_err(|err| {
            format!(
                "failed to write config snapshot {}: {}",
                path.display(),
                err
            )
        })
    }

    fn write_batch_summary_csv(
        &self,
        path: &Path,
        rows: &[BatchSummaryRow],
    ) -> Result<(), String> {
        reporting::write_batch_summary_csv(path, rows)
    }

    fn write_comparison_summary_csv(
        &self,
        path: &Path,
        rows: &[ComparisonRow],
    ) -> Result<(), String> {
        reporting::write_comparison_summary_csv(path, rows)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactReader;

impl FilesystemArtifactReader {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactReader for FilesystemArtifactReader {
    fn read_history_csv(&self, path: &Path) -> Result<Vec<HistoryPoint>, String> {
        reporting::read_history_csv(path)
    }

    fn read_trades_csv(&self, path: &Path) -> Result<Vec<ClosedTrade>, String> {
        reporting::read_trades_csv(path)
    }

    fn read_executions_csv(&self, path: &Path) -> Result<Vec<ExecutionRecord>, String> {
        reporting::read_executions_csv(path)
    }

    fn read_config_snapshot_toml(&self, path: &Path) -> Result<Option<String>, String> {
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(path)
            .map(Some)
            .map_err(|err| format!("failed to read config snapshot {}: {}", path.display(), err))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
