//! On-disk cache file bookkeeping
//!
//! Owns the cache file, the index file, and the generation stamp in the
//! index header. The column-chunk packing itself is performed by the
//! engine's cache writer against the layout manifest this store lays
//! down; what the coordinator needs from here is reliable version
//! accounting across restarts.

use crate::cache::{CacheOptions, CacheRebuilder};
use crate::common::Result;
use crate::metadata::Layout;
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

const INDEX_MAGIC: &[u8; 8] = b"COLCIDX1";
const HEADER_LEN: usize = 16;

/// Local cache store
pub struct LocalCacheStore {
    opts: CacheOptions,
}

impl LocalCacheStore {
    /// Open the store, creating directories and the index file as needed.
    /// With `overwrite` set, any existing index is discarded and the node
    /// starts from generation 0.
    pub fn open(opts: CacheOptions) -> Result<Self> {
        for location in [&opts.cache_location, &opts.index_location] {
            if let Some(parent) = location.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        if !opts.warehouse_path.is_empty() {
            tracing::debug!("cache warehouse: {}", opts.warehouse_path);
        }
        if opts.overwrite && opts.index_location.exists() {
            tracing::info!(
                "discarding existing cache index at {}",
                opts.index_location.display()
            );
            fs::remove_file(&opts.index_location)?;
        }
        if !opts.index_location.exists() {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&opts.index_location)?;
            file.set_len(opts.index_size.max(HEADER_LEN as u64))?;
        }
        Ok(Self { opts })
    }

    fn read_version(path: &Path) -> Result<u64> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        if bytes.len() < HEADER_LEN {
            return Ok(0);
        }
        if &bytes[..8] != INDEX_MAGIC {
            // a freshly allocated index is all zeros; anything else is noise
            if bytes[..HEADER_LEN].iter().any(|b| *b != 0) {
                tracing::warn!(
                    "unrecognized index header in {}, treating cache as absent",
                    path.display()
                );
            }
            return Ok(0);
        }
        let mut version = [0u8; 8];
        version.copy_from_slice(&bytes[8..HEADER_LEN]);
        Ok(u64::from_le_bytes(version))
    }

    fn write_version(path: &Path, version: u64) -> Result<()> {
        let mut file = OpenOptions::new().create(true).write(true).open(path)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(INDEX_MAGIC)?;
        file.write_all(&version.to_le_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn manifest_path(&self) -> std::path::PathBuf {
        self.opts.index_location.with_extension("layout.json")
    }
}

#[async_trait]
impl CacheRebuilder for LocalCacheStore {
    async fn persisted_version(&self) -> Result<u64> {
        Self::read_version(&self.opts.index_location)
    }

    async fn rebuild(&self, version: u64, layout: &Layout) -> Result<bool> {
        tracing::debug!(
            "packing cache on {} for layout {} at version {}",
            self.opts.hostname,
            layout.id,
            version
        );
        // reserve the cache file at its configured size
        let cache = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.opts.cache_location)?;
        cache.set_len(self.opts.cache_size)?;
        // lay down the layout manifest the cache writer packs from, then
        // stamp the version; the stamp is the commit point
        fs::write(self.manifest_path(), serde_json::to_vec_pretty(layout)?)?;
        Self::write_version(&self.opts.index_location, version)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options(dir: &Path) -> CacheOptions {
        CacheOptions {
            cache_location: dir.join("cache"),
            cache_size: 4096,
            index_location: dir.join("cache.index"),
            index_size: 1024,
            overwrite: false,
            warehouse_path: "hdfs://nn:9000/warehouse".to_string(),
            hostname: "worker-1".to_string(),
        }
    }

    fn layout(version: u64) -> Layout {
        Layout {
            id: 11,
            version,
            payload: serde_json::json!({"splits": [1, 2, 3]}),
        }
    }

    #[tokio::test]
    async fn test_fresh_index_has_version_zero() {
        let dir = tempdir().unwrap();
        let store = LocalCacheStore::open(options(dir.path())).unwrap();
        assert_eq!(store.persisted_version().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rebuild_stamps_version_durably() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path());

        let store = LocalCacheStore::open(opts.clone()).unwrap();
        assert!(store.rebuild(7, &layout(7)).await.unwrap());
        assert_eq!(store.persisted_version().await.unwrap(), 7);

        // survives reopen
        let store = LocalCacheStore::open(opts).unwrap();
        assert_eq!(store.persisted_version().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_rebuild_reserves_cache_file() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path());
        let store = LocalCacheStore::open(opts.clone()).unwrap();
        store.rebuild(3, &layout(3)).await.unwrap();
        assert_eq!(fs::metadata(&opts.cache_location).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_overwrite_discards_index() {
        let dir = tempdir().unwrap();
        let mut opts = options(dir.path());

        let store = LocalCacheStore::open(opts.clone()).unwrap();
        store.rebuild(5, &layout(5)).await.unwrap();

        opts.overwrite = true;
        let store = LocalCacheStore::open(opts).unwrap();
        assert_eq!(store.persisted_version().await.unwrap(), 0);
    }
}
