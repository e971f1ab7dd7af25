//! Status section — safety indicators reported by the device.

use serde::{Deserialize, Serialize};

/// Fill level of the water tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WaterLevel {
    Low,
    #[default]
    Full,
}

impl WaterLevel {
    /// Whether the tank needs refilling.
    #[must_use]
    pub fn is_low(self) -> bool {
        matches!(self, Self::Low)
    }
}

impl std::fmt::Display for WaterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => f.write_str("LOW"),
            Self::Full => f.write_str("FULL"),
        }
    }
}

/// Complete status section payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusState {
    pub fire: bool,
    #[serde(rename = "waterLevel")]
    pub water_level: WaterLevel,
}
