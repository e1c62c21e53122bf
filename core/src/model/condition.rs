//! Condition vocabulary shared with the work queue: lifecycle states, the
//! status log, actions and the bios control parameters.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a task. Ordered so that a valid walk never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Pending,
    Active,
    Succeeded,
    Failed,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Succeeded | State::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Pending => "pending",
            State::Active => "active",
            State::Succeeded => "succeeded",
            State::Failed => "failed",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only list of human readable status lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusLog(Vec<String>);

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty lines are dropped.
    pub fn append(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !line.trim().is_empty() {
            self.0.push(line);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.iter().any(|l| l.contains(needle))
    }
}

impl From<Vec<String>> for StatusLog {
    fn from(lines: Vec<String>) -> Self {
        Self(lines)
    }
}

/// Opaque diagnostic payload attached by the orchestrator. Never interpreted
/// here, only carried across conversions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fault(pub serde_json::Value);

/// Requested bios control action. Unknown actions are kept verbatim so the
/// handler can reject them instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    ResetConfig,
    SetConfig,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::ResetConfig => "reset-config",
            Action::SetConfig => "set-config",
            Action::Other(s) => s,
        }
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        match s.as_str() {
            "reset-config" => Action::ResetConfig,
            "set-config" => Action::SetConfig,
            _ => Action::Other(s),
        }
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        match a {
            Action::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiosControlParameters {
    pub action: Action,
    pub asset_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bios_config_url: Option<String>,
}

impl BiosControlParameters {
    pub fn reset_config(asset_id: Uuid) -> Self {
        Self {
            action: Action::ResetConfig,
            asset_id,
            bios_config_url: None,
        }
    }

    pub fn set_config(asset_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            action: Action::SetConfig,
            asset_id,
            bios_config_url: Some(url.into()),
        }
    }

    /// Checks what serde cannot: the config url, when present, must be http(s).
    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = self.bios_config_url.as_deref() {
            let lower = url.trim().to_ascii_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return Err(format!("biosConfigUrl must be an http(s) url, got {url:?}"));
            }
        }
        Ok(())
    }
}
