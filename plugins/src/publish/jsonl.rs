//! Status updates as JSON lines on stdout or an append-only file.

use anyhow::Context;
use async_trait::async_trait;
use bioscfg_core::runner::{StatusPublisher, StatusUpdate};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

pub const STDOUT_SINK: &str = "stdout:";

#[derive(Serialize)]
struct Record<'a> {
    ts: String,
    task_id: String,
    asset_id: String,
    state: &'a str,
    status: serde_json::Value,
    task: &'a bioscfg_core::model::GenericTask,
}

struct WriteRequest {
    line: String,
    done: oneshot::Sender<std::io::Result<()>>,
}

/// Each publish resolves only after its line has been written and flushed.
/// A write error stops the writer, so every later publish fails too.
pub struct JsonlPublisher {
    sink: String,
    tx: mpsc::Sender<WriteRequest>,
}

impl JsonlPublisher {
    pub async fn start(sink: &str, channel_capacity: usize) -> anyhow::Result<Self> {
        let writer: Box<dyn AsyncWrite + Unpin + Send> = if sink == STDOUT_SINK {
            Box::new(tokio::io::stdout())
        } else {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(sink)
                .await
                .with_context(|| format!("failed to open status sink {sink}"))?;
            Box::new(file)
        };

        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        tokio::spawn(write_loop(writer, rx, sink.to_string()));

        Ok(Self {
            sink: sink.to_string(),
            tx,
        })
    }

    pub fn sink(&self) -> &str {
        &self.sink
    }
}

async fn write_loop(
    mut writer: Box<dyn AsyncWrite + Unpin + Send>,
    mut rx: mpsc::Receiver<WriteRequest>,
    sink: String,
) {
    while let Some(WriteRequest { mut line, done }) = rx.recv().await {
        if !line.ends_with('\n') {
            line.push('\n');
        }
        let result = match writer.write_all(line.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        let failed = result.is_err();
        if let Err(e) = &result {
            tracing::error!(target: "bioscfg.publish", sink = %sink, error = %e, "status sink write failed");
        }
        let _ = done.send(result);
        if failed {
            return;
        }
    }
    let _ = writer.flush().await;
}

#[async_trait]
impl StatusPublisher for JsonlPublisher {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn publish(&self, update: &StatusUpdate) -> anyhow::Result<()> {
        let record = Record {
            ts: chrono::Utc::now().to_rfc3339(),
            task_id: update.task_id.to_string(),
            asset_id: update.asset_id.to_string(),
            state: update.state.as_str(),
            status: update.status_json(),
            task: &update.task,
        };
        let line = serde_json::to_string(&record)?;

        let (done, written) = oneshot::channel();
        self.tx
            .send(WriteRequest { line, done })
            .await
            .map_err(|_| anyhow::anyhow!("status sink {} is closed", self.sink))?;
        written
            .await
            .map_err(|_| anyhow::anyhow!("status sink {} dropped the write", self.sink))?
            .with_context(|| format!("failed to write to status sink {}", self.sink))
    }
}
