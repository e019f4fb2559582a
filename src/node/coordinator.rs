//! Node-side cache coordination core
//!
//! Owns the cache-status state machine and drives the node through it:
//! startup reconciliation against the cluster version, lease-bound
//! registration, the long-lived watch loop on the version key, and
//! teardown. Collaborators come in behind traits so the whole lifecycle
//! runs unchanged against the real cluster or an in-process fake.

use crate::cache::CacheRebuilder;
use crate::common::{parse_version, resolve_hostname, Error, NodeConfig, Result};
use crate::coordination::{
    node_status_key, CoordinationClient, LeaseId, WatchEvent, CACHE_VERSION_KEY,
    CLUSTER_COORDINATOR_KEY,
};
use crate::metadata::MetadataResolver;
use crate::node::registrar::LivenessRegistrar;
use crate::node::status::{CacheStatus, StatusCell};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Node-local cache coordinator
pub struct CacheCoordinator {
    config: NodeConfig,
    hostname: String,
    node_key: String,
    coordination: Arc<dyn CoordinationClient>,
    resolver: Arc<dyn MetadataResolver>,
    rebuilder: Arc<dyn CacheRebuilder>,
    status: StatusCell,
    local_version: AtomicU64,
    lease: Mutex<Option<LeaseId>>,
    registrar: Mutex<Option<LivenessRegistrar>>,
    initialized: AtomicBool,
    shutdown_started: AtomicBool,
    lifecycle: CancellationToken,
    started_at: DateTime<Utc>,
}

impl CacheCoordinator {
    /// Build a coordinator around its collaborators. `lifecycle` is the
    /// supervisor's token; cancelling it stops the watch loop
    /// cooperatively (shutdown cancels it too).
    pub fn new(
        config: NodeConfig,
        coordination: Arc<dyn CoordinationClient>,
        resolver: Arc<dyn MetadataResolver>,
        rebuilder: Arc<dyn CacheRebuilder>,
        lifecycle: CancellationToken,
    ) -> Result<Self> {
        let hostname = resolve_hostname(config.hostname.as_deref())?;
        let node_key = node_status_key(&hostname);
        Ok(Self {
            config,
            hostname,
            node_key,
            coordination,
            resolver,
            rebuilder,
            status: StatusCell::new(CacheStatus::Initializing),
            local_version: AtomicU64::new(0),
            lease: Mutex::new(None),
            registrar: Mutex::new(None),
            initialized: AtomicBool::new(false),
            shutdown_started: AtomicBool::new(false),
            lifecycle,
            started_at: Utc::now(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn status(&self) -> CacheStatus {
        self.status.get()
    }

    pub fn local_version(&self) -> u64 {
        self.local_version.load(Ordering::Acquire)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// True until the status turns terminal
    pub fn is_running(&self) -> bool {
        self.status.get().is_running()
    }

    /// Startup reconciliation and registration.
    ///
    /// Returns false when the node cannot join: cluster not bootstrapped,
    /// coordination service unreachable, or a stale cache that could not
    /// be rebuilt. Failures are logged, the status turns terminal, and
    /// `run()` becomes a no-op; nothing is raised past this boundary.
    pub async fn initialize(&self) -> bool {
        match self.try_initialize().await {
            Ok(true) => true,
            Ok(false) => {
                tracing::info!("no cluster coordinator registered, node stays inert");
                self.status.set(CacheStatus::Dead);
                false
            }
            Err(e) => {
                tracing::error!("initialization failed: {}", e);
                self.status.set(CacheStatus::Dead);
                false
            }
        }
    }

    async fn try_initialize(&self) -> Result<bool> {
        if self
            .coordination
            .get(CLUSTER_COORDINATOR_KEY)
            .await?
            .is_none()
        {
            return Ok(false);
        }

        let local = self.rebuilder.persisted_version().await?;
        self.local_version.store(local, Ordering::Release);
        tracing::debug!("local cache version: {}", local);

        if let Some(raw) = self.coordination.get(CACHE_VERSION_KEY).await? {
            let global = parse_version(&raw)?;
            tracing::debug!("global cache version: {}", global);
            if local < global {
                // never advertise ready over a stale cache
                if !self.reconcile(global).await? {
                    return Err(Error::RebuildIncomplete(global));
                }
            }
        }

        let ttl = self.config.coordination.lease_ttl();
        let lease = self.coordination.grant_lease(ttl).await?;
        *self.lease.lock().unwrap() = Some(lease);
        self.coordination
            .put_with_lease(
                &self.node_key,
                self.status.get().code().to_string().into_bytes(),
                lease,
            )
            .await?;

        let registrar = LivenessRegistrar::start(
            self.coordination.clone(),
            lease,
            self.config.coordination.keepalive_initial_delay(),
            self.config.coordination.keepalive_interval(),
        );
        *self.registrar.lock().unwrap() = Some(registrar);

        self.status.set(CacheStatus::Ready);
        self.publish_status().await;
        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            "cache coordinator on {} initialized at version {}",
            self.hostname,
            self.local_version()
        );
        Ok(true)
    }

    /// Full lifecycle entry point: initialization followed by the watch
    /// loop. Returns when the node leaves the cluster, never joined it,
    /// or the lifecycle token fires.
    pub async fn start(&self) {
        if self.initialize().await {
            self.run().await;
        }
    }

    /// Best-effort status publication. Local state is authoritative; a
    /// failed publish is logged and never rolls the transition back.
    async fn publish_status(&self) {
        let status = self.status.get();
        let Some(lease) = *self.lease.lock().unwrap() else {
            return;
        };
        if let Err(e) = self
            .coordination
            .put_with_lease(
                &self.node_key,
                status.code().to_string().into_bytes(),
                lease,
            )
            .await
        {
            tracing::warn!("failed to publish node status {}: {}", status, e);
        }
    }

    /// Switch the local cache to `version`.
    ///
    /// Resolver errors propagate and abandon the switch. A missing layout
    /// returns Ok(false) with no status change; a failed rebuild returns
    /// Ok(false) with the status reverted to the value it had on entry.
    /// Either way the node keeps serving its current generation.
    async fn reconcile(&self, version: u64) -> Result<bool> {
        let layouts = self
            .resolver
            .resolve_layouts(&self.config.cache.schema, &self.config.cache.table, version)
            .await?;
        let Some(layout) = layouts.first() else {
            tracing::warn!("no matching layout for cache version {}", version);
            return Ok(false);
        };

        let prev = self.status.get();
        if !self.status.transition(prev, CacheStatus::Updating) {
            tracing::warn!(
                "cache status moved from {} during version switch, abandoning {}",
                prev,
                version
            );
            return Ok(false);
        }
        self.publish_status().await;

        tracing::info!("rebuilding cache to version {}", version);
        let rebuilt = match self.rebuilder.rebuild(version, layout).await {
            Ok(rebuilt) => rebuilt,
            Err(e) => {
                tracing::warn!("cache rebuild to version {} failed: {}", version, e);
                false
            }
        };

        if rebuilt {
            self.local_version.store(version, Ordering::Release);
            self.status.set(CacheStatus::Ready);
            self.publish_status().await;
            tracing::info!("cache is ready at version {}", version);
            Ok(true)
        } else {
            tracing::warn!(
                "cache stays at version {}, rebuild to {} did not complete",
                self.local_version(),
                version
            );
            // revert to the last-known-good status instead of lingering
            // in updating
            self.status.set(prev);
            self.publish_status().await;
            Ok(false)
        }
    }

    /// Watch loop on the global cache version.
    ///
    /// Runs until the status turns terminal, the lifecycle token fires,
    /// or the watch breaks. A deleted version key means the cluster
    /// record is gone; the node declares itself dead immediately.
    pub async fn run(&self) {
        if !self.initialized.load(Ordering::Acquire) {
            tracing::info!("not initialized, watch loop will not start");
            return;
        }
        let mut events = match self.coordination.watch(CACHE_VERSION_KEY).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("cannot watch {}: {}", CACHE_VERSION_KEY, e);
                self.status.set(CacheStatus::Dead);
                return;
            }
        };
        tracing::info!("watching {} for cache version changes", CACHE_VERSION_KEY);

        'watch: while self.status.get().is_watching() {
            tokio::select! {
                _ = self.lifecycle.cancelled() => {
                    tracing::info!("lifecycle token cancelled, leaving watch loop");
                    break 'watch;
                }
                batch = events.next() => match batch {
                    Some(Ok(batch)) => {
                        for event in batch {
                            match event {
                                WatchEvent::Put { value } => {
                                    let version = match parse_version(&value) {
                                        Ok(version) => version,
                                        Err(e) => {
                                            tracing::warn!("ignoring cache version update: {}", e);
                                            continue;
                                        }
                                    };
                                    tracing::debug!("cache version update observed: {}", version);
                                    if version > self.local_version() {
                                        if let Err(e) = self.reconcile(version).await {
                                            tracing::warn!(
                                                "reconciliation to version {} failed: {}",
                                                version,
                                                e
                                            );
                                        }
                                    }
                                }
                                WatchEvent::Delete => {
                                    tracing::error!(
                                        "cache version key deleted, the cluster is corrupted; stopping"
                                    );
                                    self.status.set(CacheStatus::Dead);
                                    break 'watch;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("watch failure: {}", e);
                        self.status.set(CacheStatus::Dead);
                        break 'watch;
                    }
                    None => {
                        tracing::error!("watch stream ended, no longer tracking the cluster");
                        self.status.set(CacheStatus::Dead);
                        break 'watch;
                    }
                }
            }
        }
        tracing::info!("watch loop stopped, status {}", self.status.get());
    }

    /// Tear the node down. Idempotent: safe to call from a signal handler
    /// while the watch loop is running; later calls are no-ops.
    pub async fn shutdown(&self) {
        if self.shutdown_started.swap(true, Ordering::AcqRel) {
            tracing::debug!("shutdown already performed");
            return;
        }
        tracing::info!("shutting down cache coordinator on {}", self.hostname);
        self.status.set(CacheStatus::Dead);
        self.lifecycle.cancel();
        let registrar = self.registrar.lock().unwrap().take();
        if let Some(registrar) = registrar {
            registrar.stop().await;
        }
        if let Err(e) = self.coordination.delete(&self.node_key).await {
            tracing::warn!("failed to delete node registration: {}", e);
        }
        tracing::info!("cache coordinator on {} shut down", self.hostname);
    }
}
