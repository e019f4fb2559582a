//! Configuration for the colcache node daemon

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node hostname; resolved from the environment when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub coordination: CoordinationConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            log_level: default_log_level(),
            coordination: CoordinationConfig::default(),
            cache: CacheConfig::default(),
            metadata: MetadataConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Coordination-service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// etcd endpoints
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Node lease TTL in seconds
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: u64,

    /// Lease keep-alive period, must stay well inside the TTL
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    /// Delay before the first keep-alive tick
    #[serde(default = "default_keepalive_delay")]
    pub keepalive_initial_delay_secs: u64,
}

fn default_endpoints() -> Vec<String> {
    vec!["http://127.0.0.1:2379".to_string()]
}
fn default_lease_ttl() -> u64 {
    30
}
fn default_keepalive_interval() -> u64 {
    10
}
fn default_keepalive_delay() -> u64 {
    1
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            lease_ttl_secs: default_lease_ttl(),
            keepalive_interval_secs: default_keepalive_interval(),
            keepalive_initial_delay_secs: default_keepalive_delay(),
        }
    }
}

impl CoordinationConfig {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn keepalive_initial_delay(&self) -> Duration {
        Duration::from_secs(self.keepalive_initial_delay_secs)
    }
}

/// Local cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Schema the node caches
    #[serde(default)]
    pub schema: String,

    /// Table the node caches
    #[serde(default)]
    pub table: String,

    /// Distributed-filesystem location column chunks are packed from
    #[serde(default)]
    pub warehouse_path: String,

    /// Cache file location
    #[serde(default = "default_cache_location")]
    pub cache_location: PathBuf,

    /// Cache file size in bytes
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,

    /// Index file location
    #[serde(default = "default_index_location")]
    pub index_location: PathBuf,

    /// Index file size in bytes
    #[serde(default = "default_index_size")]
    pub index_size: u64,

    /// Discard any existing index on startup
    #[serde(default)]
    pub overwrite: bool,
}

fn default_cache_location() -> PathBuf {
    PathBuf::from("/var/lib/colcache/cache")
}
fn default_cache_size() -> u64 {
    1024 * 1024 * 1024
}
fn default_index_location() -> PathBuf {
    PathBuf::from("/var/lib/colcache/cache.index")
}
fn default_index_size() -> u64 {
    64 * 1024 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schema: String::new(),
            table: String::new(),
            warehouse_path: String::new(),
            cache_location: default_cache_location(),
            cache_size: default_cache_size(),
            index_location: default_index_location(),
            index_size: default_index_size(),
            overwrite: false,
        }
    }
}

/// Metadata-service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Base URL of the metadata service
    #[serde(default)]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_metadata_timeout")]
    pub timeout_secs: u64,
}

fn default_metadata_timeout() -> u64 {
    10
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: default_metadata_timeout(),
        }
    }
}

impl MetadataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Admin endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bind address for the admin HTTP API
    #[serde(default = "default_admin_addr")]
    pub bind_addr: SocketAddr,
}

fn default_admin_addr() -> SocketAddr {
    "127.0.0.1:7070".parse().unwrap()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_admin_addr(),
        }
    }
}

impl NodeConfig {
    /// Load config from an optional TOML file, then `COLCACHE_*` environment
    /// overrides (e.g. `COLCACHE_CACHE__SCHEMA`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name("colcache").required(false)),
        };
        builder
            .add_source(config::Environment::with_prefix("COLCACHE").separator("__"))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> Result<()> {
        if self.cache.schema.is_empty() || self.cache.table.is_empty() {
            return Err(Error::InvalidConfig(
                "cache.schema and cache.table must be set".into(),
            ));
        }
        if self.metadata.endpoint.is_empty() {
            return Err(Error::InvalidConfig("metadata.endpoint must be set".into()));
        }
        if self.coordination.endpoints.is_empty() {
            return Err(Error::InvalidConfig(
                "coordination.endpoints must not be empty".into(),
            ));
        }
        if self.coordination.lease_ttl_secs == 0 {
            return Err(Error::InvalidConfig("lease TTL must be positive".into()));
        }
        if self.coordination.keepalive_interval_secs >= self.coordination.lease_ttl_secs {
            return Err(Error::InvalidConfig(format!(
                "keep-alive interval ({}s) must be shorter than the lease TTL ({}s)",
                self.coordination.keepalive_interval_secs, self.coordination.lease_ttl_secs
            )));
        }
        if self.cache.cache_size == 0 {
            return Err(Error::InvalidConfig("cache size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> NodeConfig {
        NodeConfig {
            cache: CacheConfig {
                schema: "tpch".to_string(),
                table: "lineitem".to_string(),
                ..Default::default()
            },
            metadata: MetadataConfig {
                endpoint: "http://meta:8080".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.coordination.lease_ttl_secs, 30);
        assert_eq!(config.coordination.keepalive_interval_secs, 10);
        assert!(config.coordination.keepalive_interval_secs < config.coordination.lease_ttl_secs);
        assert!(!config.cache.overwrite);
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_schema() {
        let mut config = valid_config();
        config.cache.schema.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_keepalive_inside_ttl() {
        let mut config = valid_config();
        config.coordination.keepalive_interval_secs = config.coordination.lease_ttl_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_missing_metadata_endpoint() {
        let mut config = valid_config();
        config.metadata.endpoint.clear();
        assert!(config.validate().is_err());
    }
}
