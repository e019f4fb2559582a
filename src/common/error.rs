//! Error types for colcache

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Coordination Errors ===
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),

    #[error("Coordination error: {0}")]
    Coordination(String),

    #[error("Lease error: {0}")]
    Lease(String),

    #[error("Watch on {0} was closed by the coordination service")]
    WatchClosed(String),

    // === Metadata Errors ===
    #[error("Metadata error: {0}")]
    Metadata(String),

    // === Cache Errors ===
    #[error("Cache rebuild to version {0} did not complete")]
    RebuildIncomplete(u64),

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Node hostname could not be resolved")]
    HostnameUnresolvable,
}
