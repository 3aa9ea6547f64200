//! Configuration schema and loader for rating nodes.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// HTTP listen address.
    pub listen: SocketAddr,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Rating service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend: "wal" (durable) or "memory".
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Directory for the WAL.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Fsync policy: "always", "batch", "none".
    #[serde(default = "default_fsync")]
    pub fsync: String,

    /// How often the WAL is synced under the "batch" policy.
    #[serde(default = "default_batch_sync_interval_ms")]
    pub batch_sync_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
            fsync: default_fsync(),
            batch_sync_interval_ms: default_batch_sync_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// How long a put may wait for its key's lock, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Read-merge-write attempts before a put reports contention.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Upper bound on siblings per entity; 0 disables the bound.
    #[serde(default = "default_max_siblings")]
    pub max_siblings: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            max_retries: default_max_retries(),
            max_siblings: default_max_siblings(),
        }
    }
}

// --- Defaults ---

fn default_backend() -> String {
    "wal".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_fsync() -> String {
    "batch".to_string()
}
fn default_batch_sync_interval_ms() -> u64 {
    1000
}
fn default_lock_timeout_ms() -> u64 {
    2000
}
fn default_max_retries() -> usize {
    5
}
fn default_max_siblings() -> usize {
    128
}

const BACKENDS: &[&str] = &["wal", "memory"];
const FSYNC_POLICIES: &[&str] = &["always", "batch", "none"];

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl NodeConfig {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "storage.backend must be one of {:?}, got '{}'",
                BACKENDS, self.storage.backend
            )));
        }
        if !FSYNC_POLICIES.contains(&self.storage.fsync.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "storage.fsync must be one of {:?}, got '{}'",
                FSYNC_POLICIES, self.storage.fsync
            )));
        }
        if self.storage.batch_sync_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "storage.batch_sync_interval_ms must be > 0".into(),
            ));
        }
        if self.service.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "service.lock_timeout_ms must be > 0".into(),
            ));
        }
        if self.service.max_retries == 0 {
            return Err(ConfigError::Invalid("service.max_retries must be > 0".into()));
        }
        Ok(())
    }
}

/// Load a `NodeConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<NodeConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load a `NodeConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<NodeConfig, ConfigError> {
    let config: NodeConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
listen: "127.0.0.1:2500"
"#;
        let config = load_from_str(yaml).unwrap();
        assert_eq!(config.listen.port(), 2500);
        assert_eq!(config.storage.backend, "wal");
        assert_eq!(config.storage.fsync, "batch");
        assert_eq!(config.service.lock_timeout_ms, 2000);
        assert_eq!(config.service.max_retries, 5);
        assert_eq!(config.service.max_siblings, 128);
        assert!(config.metrics_port.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listen: "0.0.0.0:8000"
metrics_port: 9100
storage:
  backend: memory
  data_dir: /tmp/ratings-test
  fsync: always
  batch_sync_interval_ms: 250
service:
  lock_timeout_ms: 500
  max_retries: 3
  max_siblings: 0
"#;
        let config = load_from_str(yaml).unwrap();
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/ratings-test"));
        assert_eq!(config.storage.fsync, "always");
        assert_eq!(config.service.lock_timeout_ms, 500);
        assert_eq!(config.service.max_retries, 3);
        assert_eq!(config.service.max_siblings, 0);
    }

    #[test]
    fn test_roundtrip_yaml() {
        let config = load_from_str("listen: \"127.0.0.1:9000\"\n").unwrap();
        let serialized = serde_yaml::to_string(&config).unwrap();
        let config2 = load_from_str(&serialized).unwrap();
        assert_eq!(config.listen, config2.listen);
        assert_eq!(config.service.max_siblings, config2.service.max_siblings);
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let yaml = r#"
listen: "127.0.0.1:2500"
storage:
  backend: redis
"#;
        let err = load_from_str(yaml).unwrap_err().to_string();
        assert!(err.contains("storage.backend"), "error should mention storage.backend: {}", err);
    }

    #[test]
    fn test_rejects_unknown_fsync() {
        let yaml = r#"
listen: "127.0.0.1:2500"
storage:
  fsync: sometimes
"#;
        let err = load_from_str(yaml).unwrap_err().to_string();
        assert!(err.contains("storage.fsync"), "error should mention storage.fsync: {}", err);
    }

    #[test]
    fn test_rejects_zero_retries() {
        let yaml = r#"
listen: "127.0.0.1:2500"
service:
  max_retries: 0
"#;
        let err = load_from_str(yaml).unwrap_err().to_string();
        assert!(err.contains("service.max_retries"), "{}", err);
    }

    #[test]
    fn test_rejects_zero_lock_timeout() {
        let yaml = r#"
listen: "127.0.0.1:2500"
service:
  lock_timeout_ms: 0
"#;
        let err = load_from_str(yaml).unwrap_err().to_string();
        assert!(err.contains("service.lock_timeout_ms"), "{}", err);
    }

    #[test]
    fn test_rejects_missing_listen() {
        assert!(matches!(
            load_from_str("metrics_port: 9100\n"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
