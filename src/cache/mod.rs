//! Cache rebuild seam
//!
//! The coordinator decides *when* the local cache must move to a new
//! generation; a [`CacheRebuilder`] knows *how*. [`LocalCacheStore`] is
//! the shipped implementation that owns the cache and index files and the
//! persisted generation stamp.

pub mod local;

use crate::common::{CacheConfig, Result};
use crate::metadata::Layout;
use async_trait::async_trait;
use std::path::PathBuf;

pub use local::LocalCacheStore;

/// Construction options for a cache store
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub cache_location: PathBuf,
    pub cache_size: u64,
    pub index_location: PathBuf,
    pub index_size: u64,
    pub overwrite: bool,
    /// Distributed-filesystem location the cache writer packs from
    pub warehouse_path: String,
    pub hostname: String,
}

impl CacheOptions {
    pub fn from_config(cache: &CacheConfig, hostname: &str) -> Self {
        Self {
            cache_location: cache.cache_location.clone(),
            cache_size: cache.cache_size,
            index_location: cache.index_location.clone(),
            index_size: cache.index_size,
            overwrite: cache.overwrite,
            warehouse_path: cache.warehouse_path.clone(),
            hostname: hostname.to_string(),
        }
    }
}

/// Rebuilds the node-local cache for a given cluster version
#[async_trait]
pub trait CacheRebuilder: Send + Sync {
    /// Generation currently persisted in the on-disk index, 0 if none
    async fn persisted_version(&self) -> Result<u64>;

    /// Rebuild the cache to `version` from `layout`.
    /// Returns false when the rebuild did not complete.
    async fn rebuild(&self, version: u64, layout: &Layout) -> Result<bool>;
}
