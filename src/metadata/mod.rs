//! Metadata service seam
//!
//! Resolves which physical layout a (schema, table) pair has at a given
//! cache version. The coordinator treats layouts as opaque handles and
//! only hands them to the cache rebuilder.

pub mod http;

use crate::common::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpMetadataResolver;

/// Physical placement of a (schema, table) at one cache version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub id: u64,
    pub version: u64,
    /// Placement description, passed through to the cache writer
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Resolves layouts from the cluster metadata service
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// All layouts matching (schema, table, version); empty when none match.
    /// Fails with a metadata error when the service is unreachable.
    async fn resolve_layouts(&self, schema: &str, table: &str, version: u64)
        -> Result<Vec<Layout>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_payload_is_optional() {
        let layout: Layout = serde_json::from_str(r#"{"id": 3, "version": 9}"#).unwrap();
        assert_eq!(layout.id, 3);
        assert_eq!(layout.version, 9);
        assert!(layout.payload.is_null());
    }

    #[test]
    fn test_layout_roundtrip_keeps_payload() {
        let layout = Layout {
            id: 1,
            version: 4,
            payload: serde_json::json!({"splits": [{"order": ["a", "b"]}]}),
        };
        let parsed: Layout = serde_json::from_slice(&serde_json::to_vec(&layout).unwrap()).unwrap();
        assert_eq!(parsed.payload["splits"][0]["order"][1], "b");
    }
}
