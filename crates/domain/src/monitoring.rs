//! Monitoring section — the energy sensor readings.

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Electrical readings reported by the device, in SI units
/// (volt, ampere, watt, kilowatt-hour).
///
/// `energy` is monotonically non-decreasing while the device runs, but the
/// device may reset it on reboot, so regressions are accepted rather than
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MonitoringState {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
}

impl MonitoringState {
    /// Check that every reading is a finite, non-negative number.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (name, value) in [
            ("voltage", self.voltage),
            ("current", self.current),
            ("power", self.power),
            ("energy", self.energy),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SchemaError::new(
                    "monitoring",
                    format!("{name} must be a non-negative number, got {value}"),
                ));
            }
        }
        Ok(())
    }

    /// Whether `current` strictly exceeds the given ampere threshold.
    #[must_use]
    pub fn high_current(&self, threshold: f64) -> bool {
        self.current > threshold
    }
}
