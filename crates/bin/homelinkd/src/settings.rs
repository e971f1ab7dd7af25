//! Persisted runtime settings.
//!
//! The controller's address survives restarts so operators only have to
//! enter it once. Stored as a tiny TOML table in the working directory,
//! under the same key the original deployment used.

use std::path::{Path, PathBuf};

/// Key holding the controller address.
const HOST_KEY: &str = "esp_ip_address";

/// Default state file, next to `homelink.toml`.
const DEFAULT_PATH: &str = "homelink-state.toml";

/// Handle on the persisted settings file.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self::at(DEFAULT_PATH)
    }
}

impl Settings {
    /// Settings stored at `path`.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Previously persisted controller address, if any.
    #[must_use]
    pub fn device_host(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let table: toml::Table = toml::from_str(&content).ok()?;
        table
            .get(HOST_KEY)
            .and_then(toml::Value::as_str)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
    }

    /// Persist the controller address for the next run.
    ///
    /// # Errors
    ///
    /// Returns an error when the state file cannot be written.
    pub fn save_device_host(&self, host: &str) -> std::io::Result<()> {
        let mut table = toml::Table::new();
        table.insert(HOST_KEY.to_string(), toml::Value::String(host.to_string()));
        std::fs::write(&self.path, table.to_string())
    }
}
