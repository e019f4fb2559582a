//! In-memory coordination backend
//!
//! Complete implementation of [`CoordinationClient`] for tests and
//! in-process embedding: a key space, a lease table, and watch fan-out
//! over channels. Lease expiry does not run on a wall clock; tests drive
//! it explicitly through [`MemCoordination::expire_lease`].

use crate::common::{Error, Result};
use crate::coordination::{CoordinationClient, LeaseId, WatchEvent, WatchStream};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Counters of externally observable operations, for assertions in tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounters {
    /// Keep-alive attempts, including injected failures
    pub keep_alives: u64,
    pub revokes: u64,
    pub deletes: u64,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    key_lease: HashMap<String, LeaseId>,
    lease_keys: HashMap<LeaseId, HashSet<String>>,
    next_lease: i64,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<Result<Vec<WatchEvent>>>>>,
    keep_alive_failures: u32,
    counters: OpCounters,
}

impl Inner {
    fn notify(&mut self, key: &str, event: WatchEvent) {
        if let Some(senders) = self.watchers.get_mut(key) {
            senders.retain(|sender| sender.send(Ok(vec![event.clone()])).is_ok());
        }
    }

    fn unbind(&mut self, key: &str) {
        if let Some(lease) = self.key_lease.remove(key) {
            if let Some(keys) = self.lease_keys.get_mut(&lease) {
                keys.remove(key);
            }
        }
    }

    fn remove_key(&mut self, key: &str) -> bool {
        self.unbind(key);
        if self.data.remove(key).is_some() {
            self.notify(key, WatchEvent::Delete);
            true
        } else {
            false
        }
    }
}

/// In-memory coordination service
#[derive(Default)]
pub struct MemCoordination {
    inner: Mutex<Inner>,
}

impl MemCoordination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate TTL expiry of `lease`: every bound key disappears and
    /// watchers observe the deletions, exactly as etcd would apply them.
    pub fn expire_lease(&self, lease: LeaseId) {
        let mut inner = self.inner.lock().unwrap();
        let keys: Vec<String> = inner
            .lease_keys
            .remove(&lease)
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default();
        for key in keys {
            inner.key_lease.remove(&key);
            if inner.data.remove(&key).is_some() {
                inner.notify(&key, WatchEvent::Delete);
            }
        }
    }

    /// Make the next `n` keep-alive calls fail
    pub fn fail_keep_alives(&self, n: u32) {
        self.inner.lock().unwrap().keep_alive_failures = n;
    }

    /// Whether `lease` is still granted
    pub fn lease_alive(&self, lease: LeaseId) -> bool {
        self.inner.lock().unwrap().lease_keys.contains_key(&lease)
    }

    pub fn counters(&self) -> OpCounters {
        self.inner.lock().unwrap().counters
    }

    /// Number of live watchers on `key`; lets tests wait for a watch to be
    /// established before driving events.
    pub fn watcher_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .watchers
            .get(key)
            .map(|senders| senders.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CoordinationClient for MemCoordination {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().unwrap().data.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        // a plain put detaches the key from any lease, as in etcd
        inner.unbind(key);
        inner.data.insert(key.to_string(), value.clone());
        inner.notify(key, WatchEvent::Put { value });
        Ok(())
    }

    async fn put_with_lease(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.lease_keys.contains_key(&lease) {
            return Err(Error::Lease(format!("lease {} not found", lease)));
        }
        inner.unbind(key);
        inner.key_lease.insert(key.to_string(), lease);
        inner
            .lease_keys
            .get_mut(&lease)
            .unwrap()
            .insert(key.to_string());
        inner.data.insert(key.to_string(), value.clone());
        inner.notify(key, WatchEvent::Put { value });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.counters.deletes += 1;
        inner.remove_key(key);
        Ok(())
    }

    async fn grant_lease(&self, _ttl: Duration) -> Result<LeaseId> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_lease += 1;
        let lease = LeaseId(inner.next_lease);
        inner.lease_keys.insert(lease, HashSet::new());
        Ok(lease)
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.counters.keep_alives += 1;
        if inner.keep_alive_failures > 0 {
            inner.keep_alive_failures -= 1;
            return Err(Error::Coordination("keep-alive failed (injected)".into()));
        }
        if !inner.lease_keys.contains_key(&lease) {
            return Err(Error::Lease(format!("lease {} is no longer live", lease)));
        }
        Ok(())
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.counters.revokes += 1;
            if !inner.lease_keys.contains_key(&lease) {
                return Err(Error::Lease(format!("lease {} not found", lease)));
            }
        }
        self.expire_lease(lease);
        Ok(())
    }

    async fn watch(&self, key: &str) -> Result<WatchStream> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner
            .lock()
            .unwrap()
            .watchers
            .entry(key.to_string())
            .or_default()
            .push(sender);
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}
