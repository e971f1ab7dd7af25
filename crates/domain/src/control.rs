//! Control section — the switchable outputs and the operation mode.

use serde::{Deserialize, Serialize};

/// Binary position of a switchable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Switch {
    On,
    #[default]
    Off,
}

impl Switch {
    /// Whether the output is on.
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    /// The opposite position.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    /// Map a boolean intent (`true` = on) to a switch position.
    #[must_use]
    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl std::fmt::Display for Switch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("ON"),
            Self::Off => f.write_str("OFF"),
        }
    }
}

/// Operation mode of the deployment.
///
/// In [`Auto`](Self::Auto) the device drives its own outputs and the command
/// gateway suppresses manual writes to them. Mode itself is never locked —
/// it is the escape hatch back to manual control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Auto,
    #[default]
    Manual,
}

impl Mode {
    /// Whether manual output commands are currently suppressed.
    #[must_use]
    pub fn locks_manual_control(self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str("AUTO"),
            Self::Manual => f.write_str("MANUAL"),
        }
    }
}

/// Complete control section payload.
///
/// Travels as one atomic unit over the wire — the server replaces the whole
/// subtree, it never merges. Callers composing a single-field change must
/// therefore fill the remaining fields from the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlState {
    pub light: Switch,
    pub fan: Switch,
    pub pump: Switch,
    pub mode: Mode,
}
