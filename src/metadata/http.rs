//! HTTP metadata resolver

use crate::common::{Error, Result};
use crate::metadata::{Layout, MetadataResolver};
use async_trait::async_trait;
use std::time::Duration;

/// Resolver backed by the metadata service's HTTP API
pub struct HttpMetadataResolver {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMetadataResolver {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Metadata(e.to_string()))?;
        Ok(Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl MetadataResolver for HttpMetadataResolver {
    async fn resolve_layouts(
        &self,
        schema: &str,
        table: &str,
        version: u64,
    ) -> Result<Vec<Layout>> {
        let url = format!("{}/v1/layouts", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("schema", schema),
                ("table", table),
                ("version", &version.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::Metadata(format!("metadata service unreachable: {}", e)))?;
        if !resp.status().is_success() {
            return Err(Error::Metadata(format!(
                "metadata service returned {} for {}.{} version {}",
                resp.status(),
                schema,
                table,
                version
            )));
        }
        resp.json::<Vec<Layout>>()
            .await
            .map_err(|e| Error::Metadata(format!("malformed layout response: {}", e)))
    }
}
