//! Key-Value Store Backends
//!
//! The registry only needs five capabilities from its store: an atomic
//! set-with-expiry, a prefix scan, a batch read, a delete, and keys that
//! expire on their own. Everything else about the backend stays behind
//! [`KvStore`].

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// Shared key-value store used by one or more registries
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically write `value` under `key` and set it to expire after `ttl`
    async fn put_leased(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, in store-defined order
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Values for `keys` in the same order, `None` where the key is gone
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;

    /// Remove `key`; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
