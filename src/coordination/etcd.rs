//! etcd v3 coordination backend

use crate::common::{Error, Result};
use crate::coordination::{CoordinationClient, LeaseId, WatchEvent, WatchStream};
use async_trait::async_trait;
use etcd_client::{Client, EventType, PutOptions};
use futures_util::StreamExt;
use std::time::Duration;

/// Production backend over an etcd v3 cluster
pub struct EtcdCoordination {
    client: Client,
}

impl EtcdCoordination {
    /// Connect to the given endpoints
    pub async fn connect(endpoints: &[String]) -> Result<Self> {
        let client = Client::connect(endpoints, None).await?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CoordinationClient for EtcdCoordination {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut client = self.client.clone();
        let resp = client.get(key, None).await?;
        Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut client = self.client.clone();
        client.put(key, value, None).await?;
        Ok(())
    }

    async fn put_with_lease(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<()> {
        let mut client = self.client.clone();
        client
            .put(key, value, Some(PutOptions::new().with_lease(lease.0)))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut client = self.client.clone();
        client.delete(key, None).await?;
        Ok(())
    }

    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId> {
        let mut client = self.client.clone();
        let resp = client.lease_grant(ttl.as_secs() as i64, None).await?;
        Ok(LeaseId(resp.id()))
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<()> {
        let mut client = self.client.clone();
        let (mut keeper, mut responses) = client.lease_keep_alive(lease.0).await?;
        keeper.keep_alive().await?;
        // etcd answers every keep-alive; a TTL of zero means the lease is gone
        match responses.message().await? {
            Some(resp) if resp.ttl() > 0 => Ok(()),
            _ => Err(Error::Lease(format!("lease {} is no longer live", lease))),
        }
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<()> {
        let mut client = self.client.clone();
        client.lease_revoke(lease.0).await?;
        Ok(())
    }

    async fn watch(&self, key: &str) -> Result<WatchStream> {
        let mut client = self.client.clone();
        let key = key.to_string();
        let (watcher, stream) = client.watch(key.as_str(), None).await?;
        let events = stream.map(move |resp| {
            // the watcher cancels the server-side watch when dropped, so it
            // must live exactly as long as the stream
            let _watcher = &watcher;
            let resp = resp?;
            if resp.canceled() {
                return Err(Error::WatchClosed(key.clone()));
            }
            Ok(resp
                .events()
                .iter()
                .filter_map(|event| match event.event_type() {
                    EventType::Put => event.kv().map(|kv| WatchEvent::Put {
                        value: kv.value().to_vec(),
                    }),
                    EventType::Delete => Some(WatchEvent::Delete),
                })
                .collect())
        });
        Ok(Box::pin(events))
    }
}
