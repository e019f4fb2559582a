//! Coordination-service abstraction
//!
//! A minimal seam over an etcd-like service: atomic get/put on keys,
//! lease-bound keys with TTL expiry, and change watches. The coordinator
//! core only ever talks to [`CoordinationClient`], so the backend can be
//! the real cluster ([`EtcdCoordination`]) or an in-process one
//! ([`MemCoordination`]) for tests and embedding.

pub mod etcd;
pub mod memory;

use crate::common::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::time::Duration;

pub use etcd::EtcdCoordination;
pub use memory::MemCoordination;

/// Cluster bootstrap marker, written by the cluster-side coordinator
pub const CLUSTER_COORDINATOR_KEY: &str = "cache/coordinator";

/// Global cache version, written by the cluster-side coordinator only
pub const CACHE_VERSION_KEY: &str = "cache/version";

/// Per-node status keys live under this prefix, bound to the node lease
pub const NODE_STATUS_PREFIX: &str = "cache/node/";

/// Registration key for a node
pub fn node_status_key(hostname: &str) -> String {
    format!("{}{}", NODE_STATUS_PREFIX, hostname)
}

/// Handle for a TTL-bound lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(pub i64);

impl std::fmt::Display for LeaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A single change observed on a watched key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Put { value: Vec<u8> },
    Delete,
}

/// Watches yield batches of events, in the order the service applied them
pub type WatchStream = BoxStream<'static, Result<Vec<WatchEvent>>>;

/// Client capability set this crate requires from a coordination service
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Put a key whose lifetime is tied to `lease`
    async fn put_with_lease(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Grant a lease that expires unless kept alive within `ttl`
    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId>;

    /// Renew `lease` once
    async fn keep_alive(&self, lease: LeaseId) -> Result<()>;

    /// Revoke `lease`, dropping every key bound to it
    async fn revoke_lease(&self, lease: LeaseId) -> Result<()>;

    /// Open a watch on `key`
    async fn watch(&self, key: &str) -> Result<WatchStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_status_key() {
        assert_eq!(node_status_key("worker-1"), "cache/node/worker-1");
    }

    #[test]
    fn test_lease_id_display() {
        assert_eq!(LeaseId(0x2a).to_string(), "0x2a");
    }
}
