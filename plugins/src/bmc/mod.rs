pub mod redfish;

pub use redfish::{RedfishBmc, RedfishFactory};
