use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::Asset;
use super::condition::{Fault, State, StatusLog};

/// Transport-generic task as delivered by the work queue.
///
/// `parameters` is kept as loosely typed JSON; the typed view lives in
/// [`crate::task::BiosControlTask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericTask {
    #[serde(default)]
    pub struct_version: String,
    pub id: Uuid,
    pub kind: String,
    pub state: State,
    #[serde(default)]
    pub status: StatusLog,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<Fault>,
    #[serde(default)]
    pub facility_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<Asset>,
    #[serde(default)]
    pub worker_id: String,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenericTask {
    /// Fresh pending task, as the orchestrator would enqueue it.
    pub fn new(kind: impl Into<String>, parameters: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            struct_version: "1.1".to_string(),
            id: Uuid::new_v4(),
            kind: kind.into(),
            state: State::Pending,
            status: StatusLog::new(),
            parameters,
            fault: None,
            facility_code: String::new(),
            server: None,
            worker_id: String::new(),
            trace_id: String::new(),
            span_id: String::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}
