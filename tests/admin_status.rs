//! Admin endpoint tests

use async_trait::async_trait;
use colcache::cache::CacheRebuilder;
use colcache::common::{NodeConfig, Result};
use colcache::coordination::{CoordinationClient, MemCoordination, CLUSTER_COORDINATOR_KEY};
use colcache::metadata::{Layout, MetadataResolver};
use colcache::node::admin_router;
use colcache::{CacheCoordinator, CacheStatus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct NoopRebuilder;

#[async_trait]
impl CacheRebuilder for NoopRebuilder {
    async fn persisted_version(&self) -> Result<u64> {
        Ok(4)
    }

    async fn rebuild(&self, _version: u64, _layout: &Layout) -> Result<bool> {
        Ok(true)
    }
}

struct NoopResolver;

#[async_trait]
impl MetadataResolver for NoopResolver {
    async fn resolve_layouts(
        &self,
        _schema: &str,
        _table: &str,
        _version: u64,
    ) -> Result<Vec<Layout>> {
        Ok(vec![])
    }
}

fn config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.hostname = Some("worker-9".to_string());
    config.cache.schema = "tpch".to_string();
    config.cache.table = "orders".to_string();
    config.metadata.endpoint = "http://meta:18888".to_string();
    config
}

async fn serve_admin(coordinator: Arc<CacheCoordinator>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, admin_router(coordinator)).await.ok();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_status_reports_node_state() {
    let coord = Arc::new(MemCoordination::new());
    coord
        .put(CLUSTER_COORDINATOR_KEY, b"lead-1".to_vec())
        .await
        .unwrap();
    let coordinator = Arc::new(
        CacheCoordinator::new(
            config(),
            coord,
            Arc::new(NoopResolver),
            Arc::new(NoopRebuilder),
            CancellationToken::new(),
        )
        .unwrap(),
    );
    assert!(coordinator.initialize().await);

    let base = serve_admin(coordinator.clone()).await;

    let body: serde_json::Value = reqwest::get(format!("{}/status", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["hostname"], "worker-9");
    assert_eq!(body["status"], "ready");
    assert_eq!(body["code"], CacheStatus::Ready.code());
    assert_eq!(body["local_version"], 4);

    let health = reqwest::get(format!("{}/healthz", base)).await.unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    coordinator.shutdown().await;
    let health = reqwest::get(format!("{}/healthz", base)).await.unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = reqwest::get(format!("{}/status", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "dead");
}
