use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{GenericTask, State};

/// One status transition handed to the publisher.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub task_id: Uuid,
    pub asset_id: Uuid,
    pub state: State,
    /// Serialized `TaskStatus`.
    pub status: Vec<u8>,
    /// Envelope snapshot taken right after the transition was applied.
    pub task: GenericTask,
}

impl StatusUpdate {
    pub fn status_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.status).unwrap_or(serde_json::Value::Null)
    }
}

/// Sink for status transitions. Delivery guarantees belong to the transport
/// behind it.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    fn name(&self) -> &str;
    async fn publish(&self, update: &StatusUpdate) -> anyhow::Result<()>;
}

/// Whether the terminal state of a run is known to have reached the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PublishAck {
    /// No terminal publish attempted yet.
    #[default]
    Pending,
    Confirmed,
    /// Every terminal attempt failed. The outcome stands but the durable
    /// record may disagree with it.
    Uncertain { attempts: u32, last_error: String },
}

impl PublishAck {
    pub fn is_uncertain(&self) -> bool {
        matches!(self, PublishAck::Uncertain { .. })
    }
}

pub const DEFAULT_TERMINAL_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPolicy {
    pub terminal_attempts: u32,
    pub retry_delay: Duration,
}

impl PublishPolicy {
    pub fn new(terminal_attempts: u32, retry_delay_ms: u64) -> Self {
        Self {
            terminal_attempts,
            retry_delay: Duration::from_millis(retry_delay_ms),
        }
    }

    /// At least one attempt, whatever was configured.
    pub fn max_attempts(&self) -> u32 {
        self.terminal_attempts.max(1)
    }
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINAL_ATTEMPTS, DEFAULT_RETRY_DELAY_MS)
    }
}
