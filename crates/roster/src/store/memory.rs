//! In-memory storage backend
//!
//! Expiry runs on the tokio clock, so tests that pause and advance time see
//! leases lapse exactly as they would against a real store. Also useful for
//! single-process deployments that only need discovery between tasks.
//!
//! Writes can be held open with [`MemoryStore::hold_writes`] to stage
//! operations that overlap an in-flight `put_leased`.

use super::KvStore;
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Instant,
}

/// TTL-aware map implementing [`KvStore`]
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, StoredValue>>,
    available: AtomicBool,
    writes: AtomicU64,
    /// `true` while writes are held
    write_gate: watch::Sender<bool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
            write_gate: watch::Sender::new(false),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Unavailable`] until re-enabled
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Suspend every `put_leased` after it is counted, until [`Self::release_writes`]
    pub fn hold_writes(&self) {
        self.write_gate.send_replace(true);
    }

    /// Let held and future writes complete
    pub fn release_writes(&self) {
        self.write_gate.send_replace(false);
    }

    /// Number of `put_leased` calls received, failed ones included
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Remaining time to live of `key`, if it is still present
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|stored| stored.expires_at > now)
            .map(|stored| stored.expires_at - now)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    fn purge_expired(entries: &mut BTreeMap<String, StoredValue>) {
        let now = Instant::now();
        entries.retain(|_, stored| stored.expires_at > now);
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn put_leased(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.write_gate.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = gate.wait_for(|held| !*held).await;

        self.check_available()?;

        let stored = StoredValue {
            value: value.to_vec(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().insert(key.to_string(), stored);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_available()?;

        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries);
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        self.check_available()?;

        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries);
        Ok(keys
            .iter()
            .map(|key| entries.get(key).map(|stored| stored.value.clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn test_put_and_read_back() {
        let store = MemoryStore::new();
        store.put_leased("services/rr/a/1", b"one", TTL).await.unwrap();
        store.put_leased("services/rr/b/2", b"two", TTL).await.unwrap();

        let keys = store.scan_prefix("services/rr/a/").await.unwrap();
        assert_eq!(keys, vec!["services/rr/a/1".to_string()]);

        let values = store
            .get_many(&["services/rr/b/2".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(b"two".to_vec()), None]);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_expire_after_ttl() {
        let store = MemoryStore::new();
        store.put_leased("k", b"v", TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.scan_prefix("k").await.unwrap().len(), 1);
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.scan_prefix("k").await.unwrap().is_empty());
        assert_eq!(store.ttl("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewrite_extends_expiry() {
        let store = MemoryStore::new();
        store.put_leased("k", b"v", TTL).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        store.put_leased("k", b"v", TTL).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(store.get_many(&["k".to_string()]).await.unwrap(), vec![Some(b"v".to_vec())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_write_lands_on_release() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.hold_writes();

        let writer = tokio::spawn({
            let store = store.clone();
            async move { store.put_leased("k", b"v", TTL).await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.write_count(), 1);
        assert!(!writer.is_finished());
        assert_eq!(store.ttl("k"), None);

        store.release_writes();
        writer.await.unwrap().unwrap();
        assert_eq!(store.ttl("k"), Some(TTL));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(matches!(
            store.put_leased("k", b"v", TTL).await,
            Err(StoreError::Unavailable)
        ));
        assert!(store.scan_prefix("").await.is_err());
        assert!(store.get_many(&[]).await.is_err());
        assert!(store.delete("k").await.is_err());
        assert_eq!(store.write_count(), 1);

        store.set_available(true);
        assert!(store.put_leased("k", b"v", TTL).await.is_ok());
    }
}
