//! # colcache
//!
//! Node-local cache coordinator for a distributed columnar data-serving
//! engine:
//! - a cluster-wide cache *version* lives in an etcd-like coordination service
//! - every worker node converges its local cache onto that version
//! - liveness is advertised through a lease-bound node registration
//! - version changes stream in over a watch and trigger cache rebuilds
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        Coordination service (etcd)          │
//! │  cache/coordinator      cache/version       │
//! │  cache/node/<host>  (lease-bound status)    │
//! └──────┬────────────────────┬─────────────────┘
//!        │ watch              │ lease keep-alive
//! ┌──────▼────────────────────▼─────────────────┐
//! │              CacheCoordinator               │
//! │   initializing → ready ⇄ updating │ dead    │
//! └──────┬─────────────────────┬────────────────┘
//!        │ resolve_layouts     │ rebuild(version, layout)
//! ┌──────▼──────────┐   ┌──────▼──────────┐
//! │ MetadataResolver│   │  CacheRebuilder │
//! └─────────────────┘   └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a node daemon
//! ```bash
//! colcached --config ./colcache.toml \
//!   --etcd http://etcd-0:2379 \
//!   --hostname worker-1
//! ```
//!
//! ### Check a node
//! ```bash
//! curl http://127.0.0.1:7070/status
//! ```

pub mod cache;
pub mod common;
pub mod coordination;
pub mod metadata;
pub mod node;

// Re-export commonly used types
pub use common::{Error, NodeConfig, Result};
pub use node::{CacheCoordinator, CacheStatus};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
