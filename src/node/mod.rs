//! Node-side coordination
//!
//! The cache coordinator core, its status state machine, the liveness
//! registrar, and the admin endpoint.

pub mod coordinator;
pub mod http;
pub mod registrar;
pub mod status;

pub use coordinator::CacheCoordinator;
pub use http::admin_router;
pub use registrar::LivenessRegistrar;
pub use status::{CacheStatus, StatusCell};
