//! Periodic lease keep-alive
//!
//! Keeps the node registration alive on a fixed schedule, independent of
//! the watch loop. A failed keep-alive is logged and the schedule keeps
//! running; only `stop()` ends it and revokes the lease.

use crate::coordination::{CoordinationClient, LeaseId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Scheduled task renewing the node lease
pub struct LivenessRegistrar {
    coordination: Arc<dyn CoordinationClient>,
    lease: LeaseId,
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl LivenessRegistrar {
    /// Spawn the schedule: first renewal after `initial_delay`, then every
    /// `period`. `period` must stay well inside the lease TTL; the config
    /// layer enforces that.
    pub fn start(
        coordination: Arc<dyn CoordinationClient>,
        lease: LeaseId,
        initial_delay: Duration,
        period: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let coordination = coordination.clone();
            let token = token.clone();
            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = coordination.keep_alive(lease).await {
                                tracing::warn!("lease {} keep-alive failed: {}", lease, e);
                            }
                        }
                    }
                }
            }
        });
        Self {
            coordination,
            lease,
            token,
            handle,
        }
    }

    pub fn lease(&self) -> LeaseId {
        self.lease
    }

    /// End the schedule and revoke the lease
    pub async fn stop(self) {
        self.token.cancel();
        if self.handle.await.is_err() {
            tracing::debug!("liveness registrar task did not stop cleanly");
        }
        if let Err(e) = self.coordination.revoke_lease(self.lease).await {
            tracing::warn!("failed to revoke lease {}: {}", self.lease, e);
        }
        tracing::debug!("liveness registrar stopped");
    }
}
