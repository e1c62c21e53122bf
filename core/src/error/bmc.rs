use thiserror::Error;

/// Errors raised by a [`crate::bmc::BmcSession`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BmcError {
    #[error("bmc reports server is offline")]
    Offline,

    #[error("dry-run bmc could not find server {0}")]
    UnknownAsset(String),

    #[error("bmc session is not open")]
    NotOpen,

    #[error("bmc session already closed")]
    Closed,

    #[error("operation not supported by bmc: {0}")]
    Unsupported(String),

    #[error("invalid bios config: {0}")]
    InvalidConfig(String),

    /// The controller answered, but not with what was asked for.
    #[error("bmc protocol error: {0}")]
    Protocol(String),

    /// The controller could not be reached.
    #[error("bmc transport error: {0}")]
    Transport(String),
}
