//! Registry error types

use std::time::Duration;
use thiserror::Error;

/// Invalid registry configuration, reported at construction
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid host.")]
    InvalidHost,
    #[error("renew interval {renew_interval:?} must be shorter than lease ttl {ttl:?} (ttl >= 1s)")]
    InvalidLease {
        ttl: Duration,
        renew_interval: Duration,
    },
}

/// Failure talking to the key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("store connection failed after retries: {0}")]
    Connect(String),
    #[error("store unavailable")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode service descriptor: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("registry closed")]
    Closed,
    #[error("lease for {name} was released before registration completed")]
    Cancelled { name: String },
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
