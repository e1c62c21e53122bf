//! Per-task entry point: convert, resolve the asset, pick a plan, build a
//! session and run it.

use tracing::Instrument;

use crate::config::AppConfig;
use crate::context::Services;
use crate::error::WorkerError;
use crate::model::{GenericTask, State};
use crate::runner::{Cancellation, PublishAck, PublishPolicy, TaskPlan, TaskRunner, OPEN_FAILED};
use crate::task::{BiosControlTask, TaskStatus};

pub const UNSUPPORTED_ACTION: &str = "unsupported action";

/// Outcome of one handled task.
#[derive(Debug)]
pub struct TaskReport {
    pub task: BiosControlTask,
    pub status: TaskStatus,
    pub error: Option<WorkerError>,
    pub ack: PublishAck,
}

impl TaskReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.task.state == State::Succeeded
    }

    /// The terminal state may not have reached the publisher.
    pub fn ack_uncertain(&self) -> bool {
        self.ack.is_uncertain()
    }
}

pub struct TaskHandler {
    services: Services,
    policy: PublishPolicy,
    worker_id: String,
}

impl TaskHandler {
    pub fn new(services: Services, policy: PublishPolicy) -> Self {
        Self {
            services,
            policy,
            worker_id: String::new(),
        }
    }

    pub fn from_config(services: Services, cfg: &AppConfig) -> Self {
        Self::new(services, cfg.publish.policy())
    }

    /// Stamped on tasks that arrive without a worker id.
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Errors are returned only for failures before anything was published:
    /// malformed parameters, an envelope that already finished, and asset
    /// lookup. Everything after that is reported through [`TaskReport::error`].
    pub async fn handle_task(
        &self,
        generic: &GenericTask,
        cancel: &Cancellation,
    ) -> Result<TaskReport, WorkerError> {
        let mut task = BiosControlTask::from_generic(generic).map_err(|e| {
            tracing::error!(
                target: "bioscfg.handler",
                task_id = %generic.id,
                error = %e,
                "task conversion failed"
            );
            e
        })?;

        if task.state.is_terminal() {
            tracing::error!(
                target: "bioscfg.handler",
                task_id = %task.id,
                state = %task.state,
                "task envelope is already finished"
            );
            return Err(WorkerError::AlreadyFinished(task.state));
        }

        let asset_id = task.asset_id();
        let asset = self
            .services
            .repository
            .asset_by_id(asset_id)
            .await
            .map_err(|e| {
                tracing::error!(
                    target: "bioscfg.handler",
                    task_id = %task.id,
                    asset_id = %asset_id,
                    repository = self.services.repository.name(),
                    error = %format!("{e:#}"),
                    "asset lookup error"
                );
                WorkerError::AssetLookup(format!("{e:#}"))
            })?;

        task.server = Some(asset.clone());
        if task.worker_id.is_empty() {
            task.worker_id = self.worker_id.clone();
        }

        let span = tracing::info_span!(
            target: "bioscfg.handler",
            "handle_task",
            task_id = %task.id,
            asset_id = %asset_id,
            action = %task.parameters.action,
            bmc = %asset.bmc_address,
        );

        async move {
            let publisher = self.services.publisher.clone();

            let plan = match TaskPlan::for_parameters(
                &task.parameters,
                self.services.config_source.clone(),
            ) {
                Ok(plan) => plan,
                Err(err) => {
                    let plan = TaskPlan::new(task.parameters.action.to_string(), Vec::new());
                    let mut runner = TaskRunner::new(task, plan, publisher, self.policy);
                    runner.reject(UNSUPPORTED_ACTION, &err).await;
                    return Ok(into_report(runner, Some(err)));
                }
            };

            let mut runner = TaskRunner::new(task, plan, publisher, self.policy);

            let mut session = match self.services.bmc.session_for(&asset) {
                Ok(session) => session,
                Err(e) => {
                    let err = WorkerError::SessionOpen(e);
                    runner.reject(OPEN_FAILED, &err).await;
                    return Ok(into_report(runner, Some(err)));
                }
            };

            if self.services.bmc.name() == "dry-run" {
                tracing::warn!(target: "bioscfg.handler", "running BMC in dry-run mode");
            }

            let result = runner.run(session.as_mut(), cancel).await;
            let report = into_report(runner, result.err());

            if report.succeeded() {
                tracing::info!(target: "bioscfg.handler", stage = "task.done", "task succeeded");
            } else {
                tracing::warn!(
                    target: "bioscfg.handler",
                    stage = "task.done",
                    error = %report.error.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "task failed"
                );
            }
            if report.ack_uncertain() {
                tracing::error!(
                    target: "bioscfg.handler",
                    stage = "task.ack",
                    "terminal status delivery is uncertain"
                );
            }

            Ok(report)
        }
        .instrument(span)
        .await
    }
}

fn into_report(runner: TaskRunner, error: Option<WorkerError>) -> TaskReport {
    let (task, status, ack) = runner.into_parts();
    TaskReport {
        task,
        status,
        error,
        ack,
    }
}
