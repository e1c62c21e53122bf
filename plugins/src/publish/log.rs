use async_trait::async_trait;
use bioscfg_core::runner::{StatusPublisher, StatusUpdate};

/// Emits status updates as tracing events instead of writing them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl StatusPublisher for LogPublisher {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, update: &StatusUpdate) -> anyhow::Result<()> {
        tracing::info!(
            target: "bioscfg.publish",
            task_id = %update.task_id,
            asset_id = %update.asset_id,
            state = update.state.as_str(),
            status = %String::from_utf8_lossy(&update.status),
            "task status"
        );
        Ok(())
    }
}
