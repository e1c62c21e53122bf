pub mod bmc;
#[allow(clippy::module_inception)]
pub mod error;

pub use bmc::BmcError;
pub use error::{CliError, WorkerError, RUNTIME_FAULT_MESSAGE};
