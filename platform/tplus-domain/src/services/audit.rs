use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub run_id: String,
    /// Bar the event belongs to; `None` for run-level events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<NaiveDateTime>,
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: serde_json::Value,
}
