use serde::{Deserialize, Serialize};

use crate::model::State;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub step: String,
    pub status: State,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepStatus {
    pub fn pending(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: State::Pending,
            details: String::new(),
            error: None,
        }
    }
}

/// Aggregate progress record serialized into every status publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task: String,
    pub status: State,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_step: Option<String>,
    pub steps: Vec<StepStatus>,
}

impl TaskStatus {
    /// One pending entry per step, in plan order.
    pub fn new<I, S>(task: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            task: task.into(),
            status: State::Pending,
            details: String::new(),
            error: None,
            active_step: None,
            steps: steps.into_iter().map(StepStatus::pending).collect(),
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.step == name)
    }

    pub fn marshal(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
