//! Step runner: opens the session, runs the plan fail-fast, publishes every
//! transition, contains panics and closes the session exactly once.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;

use crate::bmc::BmcSession;
use crate::error::{WorkerError, RUNTIME_FAULT_MESSAGE};
use crate::model::State;
use crate::task::{BiosControlTask, StateTransition, StepStatus, TaskStatus};

use super::plan::TaskPlan;
use super::publish::{PublishAck, PublishPolicy, StatusPublisher, StatusUpdate};
use super::step::StepContext;
use super::types::Cancellation;

pub const OPENING_SESSION: &str = "opening session";
pub const OPEN_FAILED: &str = "failed to open session";
pub const RUNNING_STEP: &str = "running step";
pub const TASK_COMPLETED: &str = "Task completed successfully";
pub const TASK_CANCELLED: &str = "task cancelled";
pub const PANIC_DETAILS: &str = "Panic occurred while running task";

pub struct TaskRunner {
    task: BiosControlTask,
    plan: TaskPlan,
    status: TaskStatus,
    publisher: Arc<dyn StatusPublisher>,
    policy: PublishPolicy,
    ack: PublishAck,
}

impl TaskRunner {
    pub fn new(
        task: BiosControlTask,
        plan: TaskPlan,
        publisher: Arc<dyn StatusPublisher>,
        policy: PublishPolicy,
    ) -> Self {
        let status = TaskStatus::new(plan.name(), plan.step_names());
        Self {
            task,
            plan,
            status,
            publisher,
            policy,
            ack: PublishAck::Pending,
        }
    }

    pub fn task(&self) -> &BiosControlTask {
        &self.task
    }

    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    pub fn ack(&self) -> &PublishAck {
        &self.ack
    }

    pub fn into_parts(self) -> (BiosControlTask, TaskStatus, PublishAck) {
        (self.task, self.status, self.ack)
    }

    /// Runs the plan against `session`. The session must not be open yet and
    /// the task must not be in a terminal state.
    pub async fn run(
        &mut self,
        session: &mut dyn BmcSession,
        cancel: &Cancellation,
    ) -> Result<(), WorkerError> {
        if self.task.state.is_terminal() {
            tracing::error!(
                target: "bioscfg.runner",
                stage = "task.start",
                task_id = %self.task.id,
                state = %self.task.state,
                "refusing to run a finished task"
            );
            return Err(WorkerError::AlreadyFinished(self.task.state));
        }

        tracing::info!(
            target: "bioscfg.runner",
            stage = "task.start",
            task_id = %self.task.id,
            plan = self.plan.name(),
            bmc = session.name(),
            "running task"
        );

        self.publish(State::Active, OPENING_SESSION, None).await;

        let opened = AssertUnwindSafe(session.open()).catch_unwind().await;
        match opened {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let err = WorkerError::SessionOpen(e);
                tracing::error!(
                    target: "bioscfg.runner",
                    stage = "session.open",
                    task_id = %self.task.id,
                    error = %err,
                    "failed to open session"
                );
                self.publish(State::Failed, OPEN_FAILED, Some(err.to_string()))
                    .await;
                return Err(err);
            }
            Err(panic) => return Err(self.handle_panic(panic).await),
        }

        let outcome = AssertUnwindSafe(self.run_steps(&mut *session, cancel))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(self.handle_panic(panic).await),
        };

        if let Err(e) = session.close().await {
            let err = WorkerError::SessionClose(e);
            tracing::warn!(
                target: "bioscfg.runner",
                stage = "session.close",
                task_id = %self.task.id,
                error = %err,
                "session close failed"
            );
        }

        result
    }

    /// Fails the task before any session exists, e.g. for an action no plan
    /// handles.
    pub async fn reject(&mut self, details: &str, err: &WorkerError) {
        tracing::warn!(
            target: "bioscfg.runner",
            stage = "task.reject",
            task_id = %self.task.id,
            error = %err,
            "{details}"
        );
        self.publish(State::Failed, details, Some(err.to_string())).await;
    }

    async fn run_steps(
        &mut self,
        session: &mut dyn BmcSession,
        cancel: &Cancellation,
    ) -> Result<(), WorkerError> {
        let mut ctx = StepContext::default();

        for idx in 0..self.plan.steps().len() {
            let name = self.plan.steps()[idx].name().to_string();

            if cancel.is_cancelled() {
                tracing::warn!(
                    target: "bioscfg.runner",
                    task_id = %self.task.id,
                    step = %name,
                    "task cancelled before step"
                );
                self.status.active_step = None;
                self.publish(State::Failed, TASK_CANCELLED, None).await;
                return Err(WorkerError::Cancelled);
            }

            self.status.active_step = Some(name.clone());
            self.set_step(idx, State::Active, RUNNING_STEP, None);
            self.publish(State::Active, RUNNING_STEP, None).await;

            let outcome = self.plan.steps()[idx].run(&mut *session, &mut ctx).await;
            match outcome {
                Ok(details) => {
                    tracing::info!(
                        target: "bioscfg.runner",
                        task_id = %self.task.id,
                        step = %name,
                        details = %details,
                        "step succeeded"
                    );
                    self.set_step(idx, State::Succeeded, &details, None);
                    self.publish(State::Active, &details, None).await;
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!(
                        target: "bioscfg.runner",
                        task_id = %self.task.id,
                        step = %name,
                        error = %message,
                        "step failed"
                    );
                    self.set_step(idx, State::Failed, "", Some(message.clone()));
                    self.publish(
                        State::Failed,
                        &format!("failed at step {name}"),
                        Some(message.clone()),
                    )
                    .await;
                    return Err(WorkerError::StepExecution {
                        step: name,
                        message,
                    });
                }
            }
        }

        self.status.active_step = None;
        tracing::info!(target: "bioscfg.runner", task_id = %self.task.id, "task completed successfully");
        self.publish(State::Succeeded, TASK_COMPLETED, None).await;
        Ok(())
    }

    async fn handle_panic(&mut self, panic: Box<dyn Any + Send>) -> WorkerError {
        let message = panic_message(panic.as_ref());
        let backtrace = Backtrace::force_capture();
        tracing::error!(
            target: "bioscfg.runner",
            stage = "task.panic",
            task_id = %self.task.id,
            panic = %message,
            backtrace = %backtrace,
            "panic occurred while running task"
        );

        if let Some(active) = self.status.active_step.take() {
            if let Some(idx) = self.status.steps.iter().position(|s| s.step == active) {
                self.set_step(idx, State::Failed, "", Some(RUNTIME_FAULT_MESSAGE.to_string()));
            }
        }
        self.publish(
            State::Failed,
            PANIC_DETAILS,
            Some(RUNTIME_FAULT_MESSAGE.to_string()),
        )
        .await;

        WorkerError::RuntimeFault
    }

    fn set_step(&mut self, idx: usize, state: State, details: &str, error: Option<String>) {
        if let Some(slot) = self.status.steps.get_mut(idx) {
            *slot = StepStatus {
                step: slot.step.clone(),
                status: state,
                details: details.to_string(),
                error,
            };
        }
    }

    /// Applies a transition to the task and hands it to the publisher.
    /// Non-terminal publishes are best-effort; terminal ones follow the
    /// retry policy and settle [`PublishAck`].
    async fn publish(&mut self, state: State, details: &str, error: Option<String>) {
        if let Err(e) = StateTransition::validate(self.task.state, state) {
            tracing::error!(
                target: "bioscfg.runner",
                task_id = %self.task.id,
                error = %e,
                "refusing out of order status update"
            );
            return;
        }

        let now = Utc::now();
        self.task.state = state;
        self.task.status.append(details);
        if let Some(err) = error.as_deref() {
            self.task.status.append(err);
        }
        self.task.updated_at = now;
        if state.is_terminal() {
            self.task.completed_at = Some(now);
        }

        self.status.status = state;
        self.status.details = details.to_string();
        if error.is_some() {
            self.status.error = error;
        }

        let envelope = match self.task.to_generic() {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(target: "bioscfg.runner", task_id = %self.task.id, error = %e, "status conversion failed");
                self.status.error = Some(e.to_string());
                return;
            }
        };
        let bytes = match self.status.marshal() {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(target: "bioscfg.runner", task_id = %self.task.id, error = %e, "status marshal failed");
                return;
            }
        };

        let update = StatusUpdate {
            task_id: self.task.id,
            asset_id: self.task.asset_id(),
            state,
            status: bytes,
            task: envelope,
        };

        tracing::debug!(
            target: "bioscfg.runner",
            task_id = %self.task.id,
            state = %state,
            details = %details,
            "task update"
        );

        if state.is_terminal() {
            self.publish_terminal(&update).await;
        } else if let Err(e) = self.publisher.publish(&update).await {
            tracing::warn!(
                target: "bioscfg.runner",
                task_id = %self.task.id,
                publisher = self.publisher.name(),
                error = %e,
                "status publish failed"
            );
        }
    }

    async fn publish_terminal(&mut self, update: &StatusUpdate) {
        let attempts = self.policy.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.publisher.publish(update).await {
                Ok(()) => {
                    self.ack = PublishAck::Confirmed;
                    return;
                }
                Err(e) => {
                    last_error = format!("{e:#}");
                    tracing::warn!(
                        target: "bioscfg.runner",
                        task_id = %self.task.id,
                        publisher = self.publisher.name(),
                        attempt,
                        attempts,
                        error = %last_error,
                        "terminal status publish failed"
                    );
                    if attempt < attempts && !self.policy.retry_delay.is_zero() {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        tracing::error!(
            target: "bioscfg.runner",
            task_id = %self.task.id,
            state = %update.state,
            attempts,
            error = %last_error,
            "terminal status could not be delivered"
        );
        self.ack = PublishAck::Uncertain {
            attempts,
            last_error,
        };
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
