use std::fmt;

use serde::{Deserialize, Serialize};

/// Host power status as reported by a management controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PowerState {
    On,
    Off,
    /// Soft reset in flight.
    Resetting,
    /// Hard power cycle in flight.
    Cycling,
    Unknown(String),
}

impl PowerState {
    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::On)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
            PowerState::Resetting => "resetting",
            PowerState::Cycling => "cycling",
            PowerState::Unknown(s) => s,
        }
    }
}

impl From<String> for PowerState {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "on" => PowerState::On,
            "off" => PowerState::Off,
            "resetting" | "reset" => PowerState::Resetting,
            "cycling" | "cycle" => PowerState::Cycling,
            _ => PowerState::Unknown(s),
        }
    }
}

impl From<PowerState> for String {
    fn from(p: PowerState) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    On,
    Off,
    Soft,
    Reset,
    Cycle,
}

impl PowerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerAction::On => "on",
            PowerAction::Off => "off",
            PowerAction::Soft => "soft",
            PowerAction::Reset => "reset",
            PowerAction::Cycle => "cycle",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootDevice {
    pub device: String,
    pub persistent: bool,
    pub efi_boot: bool,
}

impl BootDevice {
    pub fn new(device: impl Into<String>, persistent: bool, efi_boot: bool) -> Self {
        Self {
            device: device.into(),
            persistent,
            efi_boot,
        }
    }
}
