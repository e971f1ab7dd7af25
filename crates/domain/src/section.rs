//! Sections — the three top-level subtrees treated as atomic wire payloads.

use serde::{Deserialize, Serialize};

use crate::control::ControlState;
use crate::error::SchemaError;
use crate::monitoring::MonitoringState;
use crate::status::StatusState;

/// One of the three top-level subtrees of the device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Control,
    Monitoring,
    Status,
}

impl Section {
    /// All sections, in the order they are synchronised.
    pub const ALL: [Self; 3] = [Self::Control, Self::Monitoring, Self::Status];

    /// Wire path component for this section (e.g. `smartHome/control`).
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Monitoring => "monitoring",
            Self::Status => "status",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

impl std::str::FromStr for Section {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "control" => Ok(Self::Control),
            "monitoring" => Ok(Self::Monitoring),
            "status" => Ok(Self::Status),
            other => Err(SchemaError::new(
                "section",
                format!("unknown section name {other:?}"),
            )),
        }
    }
}

/// A complete, typed payload for one section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SectionValue {
    Control(ControlState),
    Monitoring(MonitoringState),
    Status(StatusState),
}

impl SectionValue {
    /// The section this payload belongs to.
    #[must_use]
    pub fn section(&self) -> Section {
        match self {
            Self::Control(_) => Section::Control,
            Self::Monitoring(_) => Section::Monitoring,
            Self::Status(_) => Section::Status,
        }
    }

    /// Decode a raw wire payload into the typed value for `section`.
    ///
    /// Out-of-domain enum values, wrong types, and missing fields all
    /// surface as schema errors; extra fields are tolerated.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] describing what did not fit.
    pub fn decode(section: Section, raw: &serde_json::Value) -> Result<Self, SchemaError> {
        let value = match section {
            Section::Control => serde_json::from_value(raw.clone()).map(Self::Control),
            Section::Monitoring => serde_json::from_value(raw.clone()).map(Self::Monitoring),
            Section::Status => serde_json::from_value(raw.clone()).map(Self::Status),
        }
        .map_err(|err| SchemaError::new(section.path(), err.to_string()))?;
        value.validate()?;
        Ok(value)
    }

    /// Enforce the numeric/enum domain invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] naming the offending field.
    pub fn validate(&self) -> Result<(), SchemaError> {
        match self {
            // Enum domains are enforced by the types themselves.
            Self::Control(_) | Self::Status(_) => Ok(()),
            Self::Monitoring(state) => state.validate(),
        }
    }

    /// Encode the payload for the wire.
    ///
    /// # Panics
    ///
    /// Never panics: all section payloads serialise infallibly.
    #[must_use]
    pub fn encode(&self) -> serde_json::Value {
        match self {
            Self::Control(state) => serde_json::to_value(state),
            Self::Monitoring(state) => serde_json::to_value(state),
            Self::Status(state) => serde_json::to_value(state),
        }
        .unwrap_or(serde_json::Value::Null)
    }
}
