pub mod clock;
pub mod dry_run;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dry_run::{DryRunBmc, DryRunFactory, DryRunRegistry, SimulatedServer};
pub use traits::{BmcSession, BmcSessionFactory};
pub use types::{BootDevice, PowerAction, PowerState};
