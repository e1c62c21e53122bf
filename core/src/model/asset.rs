use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Target server identity as resolved from the inventory.
///
/// The BMC password deserializes from inventory payloads but is never written
/// back out, so published envelopes do not carry credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: Uuid,

    #[serde(default)]
    pub bmc_address: String,
    #[serde(default)]
    pub bmc_username: String,
    #[serde(default, skip_serializing)]
    pub bmc_password: String,

    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub serial: String,

    #[serde(default)]
    pub facility_code: String,
}

impl Asset {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            bmc_address: String::new(),
            bmc_username: String::new(),
            bmc_password: String::new(),
            vendor: String::new(),
            model: String::new(),
            serial: String::new(),
            facility_code: String::new(),
        }
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("id", &self.id)
            .field("bmc_address", &self.bmc_address)
            .field("bmc_username", &self.bmc_username)
            .field("bmc_password", &"<redacted>")
            .field("vendor", &self.vendor)
            .field("model", &self.model)
            .field("serial", &self.serial)
            .field("facility_code", &self.facility_code)
            .finish()
    }
}
