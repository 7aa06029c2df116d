use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Name of the optional configuration file inside a store directory.
pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// Flush/sync strategy for log writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Flush to the OS and rely on page-cache buffering.
    #[default]
    OsDefault,
}

/// Store configuration.
///
/// ```toml
/// snapshot_interval = 16
/// sync_mode = "every_write"
/// shared_connection = false
/// create_if_missing = true
/// compression_level = 3
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Materialize a full graph every this many revisions along a chain.
    /// `0` disables snapshots.
    pub snapshot_interval: u64,
    pub sync_mode: SyncMode,
    /// Keep every persistent root of the directory in one log file.
    pub shared_connection: bool,
    /// Create the store directory when it does not exist.
    pub create_if_missing: bool,
    /// zstd level for log payloads.
    pub compression_level: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 16,
            sync_mode: SyncMode::default(),
            shared_connection: false,
            create_if_missing: true,
            compression_level: 3,
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::from_open(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn with_snapshot_interval(mut self, interval: u64) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    pub fn with_shared_connection(mut self, shared: bool) -> Self {
        self.shared_connection = shared;
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = StoreConfig::default();
        assert_eq!(config.snapshot_interval, 16);
        assert_eq!(config.sync_mode, SyncMode::OsDefault);
        assert!(!config.shared_connection);
        assert!(config.create_if_missing);
        assert_eq!(config.compression_level, 3);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = StoreConfig::from_toml_str("sync_mode = \"every_write\"\nsnapshot_interval = 4\n")
            .unwrap();
        assert_eq!(config.sync_mode, SyncMode::EveryWrite);
        assert_eq!(config.snapshot_interval, 4);
        assert!(config.create_if_missing);
    }

    #[test]
    fn toml_string_round_trips() {
        let config = StoreConfig::default()
            .with_shared_connection(true)
            .with_snapshot_interval(0);
        let text = config.to_toml_string().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = StoreConfig::from_toml_str("sync_mode = 12").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreConfig::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
