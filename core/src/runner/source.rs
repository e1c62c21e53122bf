use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Non-200 response. Displays like an HTTP status line, e.g. `404 Not Found`.
    #[error("{code} {reason}")]
    Status { code: u16, reason: String },
    #[error("bios config exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("bios config body is not valid utf-8: {0}")]
    InvalidBody(String),
    #[error("fetch failed: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn status(code: u16, reason: impl Into<String>) -> Self {
        FetchError::Status {
            code,
            reason: reason.into(),
        }
    }
}

/// Where `set-config` tasks read their BIOS configuration from.
#[async_trait]
pub trait BiosConfigSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
