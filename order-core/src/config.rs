//! Configuration for the order core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Order core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for the relational state store
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Upper bound on one ledger append (milliseconds)
    pub append_timeout_ms: u64,

    /// Logistics provider assigned to new shipments
    pub default_logistics_id: Option<String>,

    /// Hours from first checkpoint to estimated arrival
    pub estimated_transit_hours: i64,

    /// Hex-encoded Ed25519 seed used to sign ledger submissions
    pub signing_seed: Option<String>,

    /// State store tuning
    pub store: StoreConfig,

    /// Embedded ledger (used by the tooling binaries)
    pub ledger: event_ledger::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/orders"),
            service_name: "order-core".to_string(),
            append_timeout_ms: 5_000,
            default_logistics_id: None,
            estimated_transit_hours: 72,
            signing_seed: None,
            store: StoreConfig::default(),
            ledger: event_ledger::Config::default(),
        }
    }
}

/// RocksDB configuration for the state store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// fsync every transaction
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 32,
            max_background_jobs: 2,
            sync_writes: true,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.ledger = event_ledger::Config::from_env()?;

        if let Ok(data_dir) = std::env::var("ORDER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(timeout) = std::env::var("ORDER_APPEND_TIMEOUT_MS") {
            config.append_timeout_ms = timeout
                .parse()
                .map_err(|e| crate::Error::Config(format!("ORDER_APPEND_TIMEOUT_MS: {}", e)))?;
        }

        if let Ok(logistics) = std::env::var("ORDER_DEFAULT_LOGISTICS_ID") {
            config.default_logistics_id = Some(logistics);
        }

        if let Ok(seed) = std::env::var("ORDER_SIGNING_SEED") {
            config.signing_seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the core unusable
    pub fn validate(&self) -> crate::Result<()> {
        if self.append_timeout_ms == 0 {
            return Err(crate::Error::Config(
                "append_timeout_ms must be positive".to_string(),
            ));
        }
        if self.estimated_transit_hours < 0 {
            return Err(crate::Error::Config(
                "estimated_transit_hours must not be negative".to_string(),
            ));
        }
        self.ledger.validate()?;
        Ok(())
    }

    /// Append timeout as a duration
    pub fn append_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.append_timeout_ms)
    }
}
