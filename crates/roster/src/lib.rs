//! Roster Library
//!
//! Lease-based service discovery over a shared key-value store with expiring
//! keys. See [`Registry`] for the entry point.

pub mod address;
pub mod config;
pub mod error;
pub mod lease;
pub mod observability;
pub mod registry;
pub mod store;

pub use config::{ConnectBackoff, ConnectionOptions, LeaseConfig, RegistryConfig};
pub use error::{ConfigError, RegistryError, Result, StoreError};
pub use lease::{LeaseId, LeaseInfo, LeaseState};
pub use registry::Registry;
pub use store::{KvStore, MemoryStore, RedisStore};

pub use roster_core::{DescriptorInput, KeySpace, ServiceDescriptor};
