//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,

    /// Retry configuration
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/canteen"),
            service_name: "canteen-ledger".to_string(),
            rocksdb: RocksDbConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Retry configuration
///
/// Read paths (balances, listings) get a few attempts before degrading to a
/// "try again later" error. The ledger-append half of a confirmation is
/// retried much harder: by that point the claim has already left the pending
/// queue, and giving up means a real payment is at risk of being lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts for read operations
    pub read_attempts: u32,

    /// Base backoff between read attempts (milliseconds)
    pub read_backoff_ms: u64,

    /// Attempts for the post-removal ledger append
    pub confirm_append_attempts: u32,

    /// Base backoff between append attempts (milliseconds)
    pub confirm_append_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            read_attempts: 3,
            read_backoff_ms: 50,
            confirm_append_attempts: 8,
            confirm_append_backoff_ms: 100,
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

        if let Ok(data_dir) = std::env::var("CANTEEN_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(attempts) = std::env::var("CANTEEN_READ_ATTEMPTS") {
            config.retry.read_attempts = attempts
                .parse()
                .map_err(|_| crate::Error::Config("CANTEEN_READ_ATTEMPTS must be an integer".to_string()))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "canteen-ledger");
        assert_eq!(config.retry.read_attempts, 3);
        assert!(config.retry.confirm_append_attempts > config.retry.read_attempts);
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/var/lib/canteen"
service_name = "canteen-ledger"

[rocksdb]
write_buffer_size_mb = 16
max_write_buffer_number = 2
max_background_jobs = 1
enable_statistics = false

[retry]
read_attempts = 5
read_backoff_ms = 20
confirm_append_attempts = 10
confirm_append_backoff_ms = 250
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/canteen"));
        assert_eq!(config.retry.read_attempts, 5);
        assert_eq!(config.rocksdb.write_buffer_size_mb, 16);
    }

    #[test]
    fn test_config_from_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not toml at all [[[").unwrap();
        assert!(Config::from_file(&path).is_err());
    }
}
