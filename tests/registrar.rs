//! Liveness registrar schedule tests
//!
//! Run on the paused tokio clock so the keep-alive cadence is exact.

use colcache::coordination::{CoordinationClient, MemCoordination};
use colcache::node::LivenessRegistrar;
use std::sync::Arc;
use std::time::Duration;

async fn granted(coord: &Arc<MemCoordination>) -> colcache::coordination::LeaseId {
    coord.grant_lease(Duration::from_secs(30)).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_first_renewal_after_initial_delay() {
    let coord = Arc::new(MemCoordination::new());
    let lease = granted(&coord).await;
    let registrar = LivenessRegistrar::start(
        coord.clone(),
        lease,
        Duration::from_secs(5),
        Duration::from_secs(10),
    );

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(coord.counters().keep_alives, 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(coord.counters().keep_alives, 1);

    registrar.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_renewals_follow_the_period() {
    let coord = Arc::new(MemCoordination::new());
    let lease = granted(&coord).await;
    let registrar = LivenessRegistrar::start(
        coord.clone(),
        lease,
        Duration::from_secs(1),
        Duration::from_secs(10),
    );

    // ticks at 1s, 11s, ..., 51s
    tokio::time::sleep(Duration::from_secs(52)).await;
    assert_eq!(coord.counters().keep_alives, 6);
    assert!(coord.lease_alive(lease));

    registrar.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_failures_do_not_stop_the_schedule() {
    let coord = Arc::new(MemCoordination::new());
    let lease = granted(&coord).await;
    coord.fail_keep_alives(5);
    let registrar = LivenessRegistrar::start(
        coord.clone(),
        lease,
        Duration::from_secs(1),
        Duration::from_secs(10),
    );

    // five failing ticks, then renewals succeed again
    tokio::time::sleep(Duration::from_secs(72)).await;
    assert_eq!(coord.counters().keep_alives, 8);
    assert!(coord.lease_alive(lease));

    registrar.stop().await;
    assert!(!coord.lease_alive(lease));
}

#[tokio::test(start_paused = true)]
async fn test_stop_revokes_lease_and_ends_schedule() {
    let coord = Arc::new(MemCoordination::new());
    let lease = granted(&coord).await;
    let registrar = LivenessRegistrar::start(
        coord.clone(),
        lease,
        Duration::from_secs(1),
        Duration::from_secs(10),
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    registrar.stop().await;
    assert!(!coord.lease_alive(lease));
    assert_eq!(coord.counters().revokes, 1);

    let after_stop = coord.counters().keep_alives;
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(coord.counters().keep_alives, after_stop);
}
