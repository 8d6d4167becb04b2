//! # Node Configuration
//!
//! Sectioned configuration with sane defaults. Loaded from an optional JSON
//! file, then overridden by `MESHMQ_*` environment variables, then
//! validated. Every field has a default so an empty file or no file at all
//! yields a working single-node broker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;
use thiserror::Error;
use tracing::warn;

use meshmq_auth::{AuthConfig, Operation};
use meshmq_routing::RoutingConfig;
use meshmq_types::EntityId;

use crate::adapters::{RocksDbConfig, StaticGrant};

/// Complete broker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub storage: StorageSection,
    pub routing: RoutingSection,
    pub queue: QueueSection,
    pub auth: AuthSection,
}

/// Durable storage settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// Directory the RocksDB database lives in.
    pub data_dir: PathBuf,
    /// Fsync every write. Disable only where losing the tail of the queue
    /// on power failure is acceptable.
    pub sync_writes: bool,
    /// Memtable size in bytes.
    pub write_buffer_size: usize,
    /// Block cache size in bytes.
    pub block_cache_size: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            sync_writes: true,
            write_buffer_size: 64 * 1024 * 1024,
            block_cache_size: 256 * 1024 * 1024,
        }
    }
}

/// Routing core settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingSection {
    /// Namespaces this node is the designated router for.
    pub designated_namespaces: Vec<String>,
    /// Ceiling on subscription lifetimes, seconds.
    pub max_subscription_ttl_secs: u64,
    /// Per-subscriber delivery channel capacity.
    pub delivery_buffer: usize,
    /// How often expired subscriptions are swept, seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            designated_namespaces: Vec::new(),
            max_subscription_ttl_secs: 24 * 60 * 60,
            delivery_buffer: 256,
            sweep_interval_secs: 30,
        }
    }
}

/// Durable queue settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSection {
    /// Queued entries older than this are evicted, seconds.
    pub retention_secs: u64,
    /// How often the retention sweep runs, seconds.
    pub sweep_interval_secs: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            retention_secs: 7 * 24 * 60 * 60,
            sweep_interval_secs: 300,
        }
    }
}

/// Authorization settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    /// Deadline for one proof verification, milliseconds.
    pub verifier_timeout_ms: u64,
    /// Ceiling on how long verdicts stay cached, seconds.
    pub max_verdict_ttl_secs: u64,
    /// Maximum number of cached verdicts.
    pub cache_capacity: usize,
    /// Refuse proofs whose revocation status could not be checked.
    pub strict_revocation: bool,
    /// Lifetime of verdicts issued by the static verifier, seconds.
    pub grant_ttl_secs: u64,
    /// The static grant table.
    pub grants: Vec<GrantEntry>,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            verifier_timeout_ms: 2_000,
            max_verdict_ttl_secs: 300,
            cache_capacity: 16_384,
            strict_revocation: false,
            grant_ttl_secs: 3_600,
            grants: Vec::new(),
        }
    }
}

/// One entry in the static grant table.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantEntry {
    /// Entity the grant applies to, 32 bytes hex.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub subject: [u8; 32],
    /// Restrict the grant to one operation; absent means both.
    #[serde(default)]
    pub operation: Option<Operation>,
    /// Namespace the grant covers.
    pub namespace: String,
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

impl NodeConfig {
    /// Loads configuration from an optional JSON file, applies `MESHMQ_*`
    /// environment overrides, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&raw)?
            }
            None => NodeConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables override the file:
    ///
    /// - `MESHMQ_DATA_DIR` - storage directory
    /// - `MESHMQ_NAMESPACES` - comma-separated designated namespaces
    /// - `MESHMQ_SYNC_WRITES` - `true` / `false`
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("MESHMQ_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(namespaces) = std::env::var("MESHMQ_NAMESPACES") {
            self.routing.designated_namespaces = namespaces
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(sync) = std::env::var("MESHMQ_SYNC_WRITES") {
            match sync.parse() {
                Ok(value) => self.storage.sync_writes = value,
                Err(_) => warn!(value = %sync, "ignoring non-boolean MESHMQ_SYNC_WRITES"),
            }
        }
    }

    /// Rejects configurations the broker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.routing.delivery_buffer == 0 {
            return Err(ConfigError::Invalid {
                reason: "routing.delivery_buffer must be at least 1".to_string(),
            });
        }
        if self.auth.cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "auth.cache_capacity must be at least 1".to_string(),
            });
        }
        for namespace in &self.routing.designated_namespaces {
            if namespace.is_empty() || namespace.contains(['/', '+', '#']) {
                return Err(ConfigError::Invalid {
                    reason: format!(
                        "designated namespace {namespace:?} must be one concrete segment"
                    ),
                });
            }
        }
        for grant in &self.auth.grants {
            if grant.namespace.is_empty() || grant.namespace.contains(['/', '+', '#']) {
                return Err(ConfigError::Invalid {
                    reason: format!(
                        "grant namespace {:?} must be one concrete segment",
                        grant.namespace
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn routing_config(&self) -> RoutingConfig {
        RoutingConfig {
            designated_namespaces: self.routing.designated_namespaces.clone(),
            max_subscription_ttl: Duration::from_secs(self.routing.max_subscription_ttl_secs),
            delivery_buffer: self.routing.delivery_buffer,
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            verifier_timeout: Duration::from_millis(self.auth.verifier_timeout_ms),
            max_verdict_ttl: Duration::from_secs(self.auth.max_verdict_ttl_secs),
            cache_capacity: self.auth.cache_capacity,
            strict_revocation: self.auth.strict_revocation,
        }
    }

    pub fn rocksdb_config(&self) -> RocksDbConfig {
        RocksDbConfig {
            path: self.storage.data_dir.join("db"),
            write_buffer_size: self.storage.write_buffer_size,
            block_cache_size: self.storage.block_cache_size,
            sync_writes: self.storage.sync_writes,
        }
    }

    /// The grant table as the static verifier consumes it.
    pub fn static_grants(&self) -> Vec<StaticGrant> {
        self.auth
            .grants
            .iter()
            .map(|entry| StaticGrant {
                subject: EntityId::new(entry.subject),
                operation: entry.operation,
                namespace: entry.namespace.clone(),
            })
            .collect()
    }
}
