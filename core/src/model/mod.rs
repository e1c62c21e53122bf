pub mod asset;
pub mod condition;
pub mod envelope;

pub use asset::Asset;
pub use condition::{Action, BiosControlParameters, Fault, State, StatusLog};
pub use envelope::GenericTask;

/// Kind string the orchestrator uses for bios control conditions.
pub const BIOS_CONTROL_KIND: &str = "biosControl";
