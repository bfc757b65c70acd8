//! service-core: Shared infrastructure for the fleet billing services.
pub mod config;
pub mod error;
pub mod observability;

pub use serde;
pub use tracing;
