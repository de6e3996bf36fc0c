use crate::entities::metrics::PerformanceMetrics;
use crate::services::audit::AuditEvent;
use crate::value_objects::closed_trade::ClosedTrade;
use crate::value_objects::execution::ExecutionRecord;
use crate::value_objects::history_point::HistoryPoint;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One line of `batch_summary.csv`. Metric columns are empty for symbols that
/// were skipped or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummaryRow {
    pub symbol: String,
    pub status: String,
    pub total_return: Option<f64>,
    pub annualized_return: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub number_of_trades: Option<usize>,
    pub win_rate: Option<f64>,
}

/// One line of `comparison_summary.csv`, in variant declaration order.
/// Metric columns are empty for a variant that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub variant: String,
    pub strategy: String,
    pub sizing: String,
    pub status: String,
    pub total_return: Option<f64>,
    pub annualized_return: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub number_of_trades: Option<usize>,
    pub win_rate: Option<f64>,
    pub final_capital: Option<f64>,
}

pub trait ArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String>;
    fn write_history_csv(&self, path: &Path, points: &[HistoryPoint]) -> Result<(), String>;
    fn write_trades_csv(&self, path: &Path, trades: &[ClosedTrade]) -> Result<(), String>;
    fn write_executions_csv(&self, path: &Path, executions: &[ExecutionRecord])
        -> Result<(), String>;
    fn write_summary_json(
        &self,
        path: &Path,
        metrics: Option<&PerformanceMetrics>,
        meta: Option<&serde_json::Value>,
        config_snapshot: Option<&serde_json::Value>,
    ) -> Result<(), String>;
    fn write_summary_html(
        &self,
        path: &Path,
        metrics: Option<&PerformanceMetrics>,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), String>;
    fn write_dashboard_html(
        &self,
        path: &Path,
        metrics: Option<&PerformanceMetrics>,
        meta: Option<&serde_json::Value>,
        history: &[HistoryPoint],
        executions: &[ExecutionRecord],
    ) -> Result<(), String>;
    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String>;
    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String>;
    fn write_batch_summary_csv(&self, path: &Path, rows: &[BatchSummaryRow])
        -> Result<(), String>;
    fn write_comparison_summary_csv(&self, path: &Path, rows: &[ComparisonRow])
        -> Result<(), String>;
}

pub trait ArtifactReader {
    fn read_history_csv(&self, path: &Path) -> Result<Vec<HistoryPoint>, String>;
    fn read_trades_csv(&self, path: &Path) -> Result<Vec<ClosedTrade>, String>;
    fn read_executions_csv(&self, path: &Path) -> Result<Vec<ExecutionRecord>, String>;
    fn read_config_snapshot_toml(&self, path: &Path) -> Result<Option<String>, String>;
    fn exists(&self, path: &Path) -> bool;
}
