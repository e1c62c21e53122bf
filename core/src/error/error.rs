use thiserror::Error;

use super::bmc::BmcError;
use crate::model::State;

/// Text reported for a step that panicked. Callers match on it, keep it stable.
pub const RUNTIME_FAULT_MESSAGE: &str = "Task fatal error, check logs for details";

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("invalid condition parameters: {0}")]
    InvalidParameters(String),
    #[error("error in generic task conversion: {0}")]
    Conversion(String),
    #[error("asset lookup error: {0}")]
    AssetLookup(String),
    #[error("failed to open bmc session: {0}")]
    SessionOpen(#[source] BmcError),
    #[error("failed to close bmc session: {0}")]
    SessionClose(#[source] BmcError),
    #[error("step {step} failed: {message}")]
    StepExecution { step: String, message: String },
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),
    #[error("{}", RUNTIME_FAULT_MESSAGE)]
    RuntimeFault,
    #[error("task cancelled")]
    Cancelled,
    #[error("task is already {0}, refusing to run it again")]
    AlreadyFinished(State),
    #[error("config error: {0}")]
    Config(String),
}

impl WorkerError {
    /// Only inventory failures are worth a redelivery; everything else would
    /// fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AssetLookup(_))
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("worker failed: {0}")]
    Worker(#[from] WorkerError),
    #[error("dispatch failed: {0}")]
    Dispatch(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_fault_display_is_stable() {
        assert_eq!(
            WorkerError::RuntimeFault.to_string(),
            "Task fatal error, check logs for details"
        );
    }

    #[test]
    fn already_finished_names_the_state() {
        assert_eq!(
            WorkerError::AlreadyFinished(State::Failed).to_string(),
            "task is already failed, refusing to run it again"
        );
    }

    #[test]
    fn only_asset_lookup_is_retryable() {
        assert!(WorkerError::AssetLookup("fleetdb down".into()).is_retryable());
        assert!(!WorkerError::InvalidParameters("bad json".into()).is_retryable());
        assert!(!WorkerError::SessionOpen(BmcError::Offline).is_retryable());
        assert!(!WorkerError::UnsupportedAction("flash".into()).is_retryable());
        assert!(!WorkerError::RuntimeFault.is_retryable());
        assert!(!WorkerError::AlreadyFinished(State::Succeeded).is_retryable());
    }
}
