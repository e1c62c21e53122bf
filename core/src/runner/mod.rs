pub mod plan;
pub mod publish;
mod run;
pub mod source;
pub mod step;
pub mod steps;
pub mod types;

pub use plan::TaskPlan;
pub use publish::{PublishAck, PublishPolicy, StatusPublisher, StatusUpdate};
pub use run::{
    TaskRunner, OPENING_SESSION, OPEN_FAILED, PANIC_DETAILS, RUNNING_STEP, TASK_CANCELLED,
    TASK_COMPLETED,
};
pub use source::{BiosConfigSource, FetchError};
pub use step::{Step, StepContext, StepError};
pub use types::{CancelHandle, Cancellation};
