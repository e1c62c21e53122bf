//! Local work queue: task envelopes as JSON lines, executed under a
//! concurrency bound with redelivery of retryable failures.

use std::sync::Arc;
use std::time::Duration;

use bioscfg_core::config::{AppConfig, DispatchConfig};
use bioscfg_core::error::CliError;
use bioscfg_core::model::GenericTask;
use bioscfg_core::runner::Cancellation;
use bioscfg_core::{TaskHandler, TaskReport};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub received: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Never executed: unparseable, invalid, or out of redeliveries.
    pub rejected: usize,
    pub redelivered: usize,
    pub ack_uncertain: usize,
}

enum Delivery {
    Report(Box<TaskReport>, u32),
    Rejected(u32),
}

pub struct Dispatcher {
    handler: Arc<TaskHandler>,
    permits: Arc<Semaphore>,
    redelivery: DispatchConfig,
    progress: watch::Sender<DispatchSummary>,
}

impl Dispatcher {
    pub fn new(handler: TaskHandler, cfg: &AppConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            permits: Arc::new(Semaphore::new(cfg.concurrency.max(1))),
            redelivery: cfg.dispatch.clone(),
            progress: watch::channel(DispatchSummary::default()).0,
        }
    }

    /// Running totals, updated as each task finishes.
    pub fn progress(&self) -> watch::Receiver<DispatchSummary> {
        self.progress.subscribe()
    }

    /// Reads envelopes until EOF or cancellation, then waits for in-flight
    /// tasks. Cancellation stops intake and is passed to every running task.
    pub async fn run<R>(&self, reader: R, cancel: Cancellation) -> Result<DispatchSummary, CliError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = DispatchSummary::default();
        let mut in_flight = JoinSet::new();
        let mut lines = reader.lines();
        let mut line_no = 0usize;
        self.progress.send_replace(summary);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(target: "bioscfg.dispatch", "cancelled, no new tasks accepted");
                    break;
                }
                Some(joined) = in_flight.join_next() => {
                    self.reap(&mut summary, joined);
                    continue;
                }
                line = lines.next_line() => line,
            };
            let Some(line) = next.map_err(|e| CliError::Dispatch(format!("read tasks: {e}")))?
            else {
                break;
            };
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            summary.received += 1;
            let task: GenericTask = match serde_json::from_str(&line) {
                Ok(task) => task,
                Err(e) => {
                    tracing::error!(
                        target: "bioscfg.dispatch",
                        line = line_no,
                        error = %e,
                        "discarding malformed task envelope"
                    );
                    summary.rejected += 1;
                    self.progress.send_replace(summary);
                    continue;
                }
            };

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = self.permits.clone().acquire_owned() => permit
                    .map_err(|e| CliError::Dispatch(format!("dispatcher closed: {e}")))?,
            };

            let handler = self.handler.clone();
            let redelivery = self.redelivery.clone();
            let cancel = cancel.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                deliver(&handler, &task, &cancel, &redelivery).await
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            self.reap(&mut summary, joined);
        }

        tracing::info!(
            target: "bioscfg.dispatch",
            received = summary.received,
            succeeded = summary.succeeded,
            failed = summary.failed,
            rejected = summary.rejected,
            redelivered = summary.redelivered,
            ack_uncertain = summary.ack_uncertain,
            "task input drained"
        );
        Ok(summary)
    }

    fn reap(&self, summary: &mut DispatchSummary, joined: Result<Delivery, JoinError>) {
        match joined {
            Ok(delivery) => tally(summary, delivery),
            Err(e) => {
                tracing::error!(target: "bioscfg.dispatch", error = %e, "task worker aborted");
                summary.failed += 1;
            }
        }
        self.progress.send_replace(*summary);
    }
}

async fn deliver(
    handler: &TaskHandler,
    task: &GenericTask,
    cancel: &Cancellation,
    redelivery: &DispatchConfig,
) -> Delivery {
    let mut redeliveries = 0u32;
    loop {
        match handler.handle_task(task, cancel).await {
            Ok(report) => return Delivery::Report(Box::new(report), redeliveries),
            Err(err) if err.is_retryable() && redeliveries < redelivery.redeliver_attempts => {
                redeliveries += 1;
                tracing::warn!(
                    target: "bioscfg.dispatch",
                    task_id = %task.id,
                    attempt = redeliveries,
                    error = %err,
                    "redelivering task"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Delivery::Rejected(redeliveries),
                    _ = tokio::time::sleep(Duration::from_millis(redelivery.redeliver_delay_ms)) => {}
                }
            }
            Err(err) => {
                tracing::error!(
                    target: "bioscfg.dispatch",
                    task_id = %task.id,
                    error = %err,
                    "task rejected"
                );
                return Delivery::Rejected(redeliveries);
            }
        }
    }
}

fn tally(summary: &mut DispatchSummary, delivery: Delivery) {
    match delivery {
        Delivery::Report(report, redeliveries) => {
            summary.redelivered += redeliveries as usize;
            if report.ack_uncertain() {
                summary.ack_uncertain += 1;
            }
            if report.succeeded() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            tracing::info!(
                target: "bioscfg.dispatch",
                task_id = %report.task.id,
                state = report.task.state.as_str(),
                error = %report.error.as_ref().map(ToString::to_string).unwrap_or_default(),
                "task finished"
            );
        }
        Delivery::Rejected(redeliveries) => {
            summary.redelivered += redeliveries as usize;
            summary.rejected += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bioscfg_core::bmc::{DryRunFactory, DryRunRegistry, ManualClock};
    use bioscfg_core::inventory::{AssetRepository, InMemoryRepository};
    use bioscfg_core::model::{Asset, BiosControlParameters, BIOS_CONTROL_KIND};
    use bioscfg_core::runner::{
        BiosConfigSource, FetchError, PublishPolicy, StatusPublisher, StatusUpdate,
    };
    use bioscfg_core::Services;
    use pretty_assertions::assert_eq;
    use tokio::io::AsyncWriteExt;
    use uuid::Uuid;

    #[derive(Default)]
    struct Counting(Mutex<usize>);

    #[async_trait]
    impl StatusPublisher for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn publish(&self, _update: &StatusUpdate) -> anyhow::Result<()> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct NoSource;

    #[async_trait]
    impl BiosConfigSource for NoSource {
        fn name(&self) -> &str {
            "none"
        }

        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            Err(FetchError::Transport("unused".into()))
        }
    }

    /// Fails the first `misses` lookups, then serves from the inner repository.
    struct Flaky {
        inner: InMemoryRepository,
        misses: Mutex<u32>,
    }

    #[async_trait]
    impl AssetRepository for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn asset_by_id(&self, id: Uuid) -> anyhow::Result<Asset> {
            {
                let mut misses = self.misses.lock().unwrap();
                if *misses > 0 {
                    *misses -= 1;
                    anyhow::bail!("inventory unavailable");
                }
            }
            self.inner.asset_by_id(id).await
        }
    }

    fn dispatcher(asset: &Asset, misses: u32) -> Dispatcher {
        let services = Services {
            repository: Arc::new(Flaky {
                inner: InMemoryRepository::new([asset.clone()]),
                misses: Mutex::new(misses),
            }),
            bmc: Arc::new(DryRunFactory::new(Arc::new(DryRunRegistry::new(Arc::new(
                ManualClock::default(),
            ))))),
            publisher: Arc::new(Counting::default()),
            config_source: Arc::new(NoSource),
        };
        let mut cfg = AppConfig {
            facility_code: "sandbox".into(),
            concurrency: 2,
            ..AppConfig::default()
        };
        cfg.dispatch.redeliver_attempts = 2;
        cfg.dispatch.redeliver_delay_ms = 0;
        Dispatcher::new(TaskHandler::new(services, PublishPolicy::new(1, 0)), &cfg)
    }

    fn line(asset: Uuid) -> String {
        let params = BiosControlParameters::reset_config(asset);
        let task = GenericTask::new(BIOS_CONTROL_KIND, serde_json::to_value(params).unwrap());
        serde_json::to_string(&task).unwrap()
    }

    #[tokio::test]
    async fn drains_input_and_counts_outcomes() {
        let asset = Asset::new(Uuid::new_v4());
        let input = format!("{}\n\nnot json\n{}\n", line(asset.id), line(asset.id));

        let summary = dispatcher(&asset, 0)
            .run(input.as_bytes(), Cancellation::never())
            .await
            .unwrap();

        assert_eq!(summary.received, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn lookup_failures_are_redelivered() {
        let asset = Asset::new(Uuid::new_v4());
        let input = line(asset.id);

        let summary = dispatcher(&asset, 2)
            .run(input.as_bytes(), Cancellation::never())
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.redelivered, 2);
    }

    #[tokio::test]
    async fn redelivery_gives_up_after_configured_attempts() {
        let asset = Asset::new(Uuid::new_v4());
        let input = line(asset.id);

        let summary = dispatcher(&asset, 5)
            .run(input.as_bytes(), Cancellation::never())
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.redelivered, 2);
    }

    #[tokio::test]
    async fn finished_tasks_are_counted_while_input_is_open() {
        let asset = Asset::new(Uuid::new_v4());
        let (mut input, output) = tokio::io::duplex(4096);
        let dispatcher = dispatcher(&asset, 0);
        let mut progress = dispatcher.progress();

        let worker = tokio::spawn(async move {
            dispatcher
                .run(tokio::io::BufReader::new(output), Cancellation::never())
                .await
        });

        input
            .write_all(format!("{}\n", line(asset.id)).as_bytes())
            .await
            .unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            progress.wait_for(|s| s.succeeded == 1),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!worker.is_finished());

        input
            .write_all(format!("{}\n", line(asset.id)).as_bytes())
            .await
            .unwrap();
        drop(input);
        let summary = worker.await.unwrap().unwrap();
        assert_eq!(summary.received, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(*progress.borrow(), summary);
    }

    #[tokio::test]
    async fn cancelled_dispatcher_accepts_nothing() {
        let asset = Asset::new(Uuid::new_v4());
        let input = line(asset.id);
        let (handle, cancel) = Cancellation::new();
        handle.cancel();

        let summary = dispatcher(&asset, 0)
            .run(input.as_bytes(), cancel)
            .await
            .unwrap();
        assert_eq!(summary.received, 0);
    }
}
