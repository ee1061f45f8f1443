//! Observability Module
//!
//! - `metrics`: lease and lookup counters exposed through the `metrics` facade
//! - `events`: structured lease lifecycle events with consistent fields
//! - `tracing`: subscriber setup for binaries embedding the registry

pub mod events;
pub mod metrics;
pub mod tracing;

pub use metrics::init_metrics;
pub use tracing::{init_tracing, LogFormat, TracingConfig};
