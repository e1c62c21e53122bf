pub mod convert;
pub mod status;
pub mod transitions;

pub use convert::BiosControlTask;
pub use status::{StepStatus, TaskStatus};
pub use transitions::{StateTransition, TransitionError};
