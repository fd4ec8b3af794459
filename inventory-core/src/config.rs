//! Configuration for the stock ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root data directory; each company gets a subdirectory
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Persistence configuration
    pub persistence: PersistenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/companies"),
            service_name: "inventory-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Pretty-print document collections (vouchers, tracking) so users
    /// can inspect their data files
    pub pretty_documents: bool,

    /// fsync the transaction log after every append
    pub fsync_appends: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            pretty_documents: true,
            fsync_appends: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("INVENTORY_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(fsync) = std::env::var("INVENTORY_FSYNC_APPENDS") {
            config.persistence.fsync_appends = matches!(fsync.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }
}
