//! Common utilities and types shared across colcache

pub mod config;
pub mod error;
pub mod utils;

pub use config::{AdminConfig, CacheConfig, CoordinationConfig, MetadataConfig, NodeConfig};
pub use error::{Error, Result};
pub use utils::{parse_version, resolve_hostname};
