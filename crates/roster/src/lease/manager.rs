//! Lease Manager
//!
//! Owns every lease this process holds and drives each one through
//! `Registering -> Active -> Destroyed`. Entries are tracked by a
//! process-unique [`LeaseId`], never by value, so two leases for the same
//! name and URL stay independent.

use super::renewal::{spawn_renewal, Renewal};
use super::LeaseId;
use crate::config::LeaseConfig;
use crate::error::{RegistryError, StoreError};
use crate::observability::{events, metrics};
use crate::store::KvStore;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle state of a live entry. Destroyed entries are removed outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    /// First write in flight
    Registering,
    /// Renewal task running
    Active,
}

/// Snapshot of a lease held by this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseInfo {
    pub id: LeaseId,
    pub name: String,
    pub key: String,
    pub state: LeaseState,
}

struct LeaseEntry {
    name: String,
    key: String,
    state: LeaseState,
    cancel: CancellationToken,
    renewal: Option<JoinHandle<()>>,
}

pub struct LeaseManager {
    store: Arc<dyn KvStore>,
    config: LeaseConfig,
    next_id: AtomicU64,
    closed: AtomicBool,
    /// Ordered by id, so releases run in join order
    entries: Mutex<BTreeMap<LeaseId, LeaseEntry>>,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn KvStore>, config: LeaseConfig) -> Self {
        Self {
            store,
            config,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Write the lease for the first time and start renewing it.
    ///
    /// The first write is not retried: if it fails the entry is dropped and
    /// the store error is returned.
    pub async fn acquire(
        &self,
        name: &str,
        key: String,
        value: Vec<u8>,
    ) -> Result<LeaseId, RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(
            id,
            LeaseEntry {
                name: name.to_string(),
                key: key.clone(),
                state: LeaseState::Registering,
                cancel: CancellationToken::new(),
                renewal: None,
            },
        );
        debug!(lease_id = id, service = %name, key = %key, "Registering lease");

        if let Err(e) = self.store.put_leased(&key, &value, self.config.ttl).await {
            metrics::record_registration(false);
            events::lease_registration_failed(id, name, &key, &e.to_string());
            self.abandon(id, &key).await;
            return Err(e.into());
        }
        metrics::record_registration(true);

        if self.is_closed() {
            self.abandon(id, &key).await;
            return Err(RegistryError::Closed);
        }

        let activated = {
            let mut entries = self.entries.lock();
            match entries.get_mut(&id) {
                Some(entry) => {
                    entry.renewal = Some(spawn_renewal(Renewal {
                        lease_id: id,
                        key: key.clone(),
                        value,
                        store: self.store.clone(),
                        config: self.config,
                        cancel: entry.cancel.clone(),
                    }));
                    entry.state = LeaseState::Active;
                    true
                }
                None => false,
            }
        };

        if !activated {
            // Released while the first write was in flight; that write may
            // have landed after the release deleted the key
            self.delete_quietly(id, &key).await;
            return Err(RegistryError::Cancelled {
                name: name.to_string(),
            });
        }

        metrics::set_active_leases(self.len());
        Ok(id)
    }

    /// Release every lease registered under `name`.
    ///
    /// All matching leases are processed even when a delete fails; the first
    /// failure is returned afterwards. Each lease waits at most one TTL for an
    /// in-flight renewal before its key is deleted.
    pub async fn release(&self, name: &str) -> Result<usize, StoreError> {
        let taken = self.take_where(|entry| entry.name == name);
        self.destroy_all(taken).await
    }

    /// Release every lease and refuse new ones
    pub async fn close(&self) -> Result<usize, StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        let taken = self.take_where(|_| true);
        info!(lease_count = taken.len(), "Closing lease manager");
        self.destroy_all(taken).await
    }

    /// Snapshot of current leases, in join order
    pub fn leases(&self) -> Vec<LeaseInfo> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| LeaseInfo {
                id: *id,
                name: entry.name.clone(),
                key: entry.key.clone(),
                state: entry.state,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_where<F>(&self, matches: F) -> Vec<(LeaseId, LeaseEntry)>
    where
        F: Fn(&LeaseEntry) -> bool,
    {
        let mut entries = self.entries.lock();
        let ids: Vec<LeaseId> = entries
            .iter()
            .filter(|(_, entry)| matches(entry))
            .map(|(id, _)| *id)
            .collect();

        let taken = ids
            .into_iter()
            .filter_map(|id| entries.remove(&id).map(|entry| (id, entry)))
            .collect();
        metrics::set_active_leases(entries.len());
        taken
    }

    async fn destroy_all(&self, taken: Vec<(LeaseId, LeaseEntry)>) -> Result<usize, StoreError> {
        let mut released = 0;
        let mut first_error = None;

        for (id, entry) in taken {
            match self.destroy(id, entry).await {
                Ok(()) => released += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(released),
        }
    }

    async fn destroy(&self, id: LeaseId, entry: LeaseEntry) -> Result<(), StoreError> {
        entry.cancel.cancel();

        // Let an in-flight renewal land before deleting, so it cannot
        // resurrect the key afterwards. A renewal stuck for a whole TTL is
        // aborted instead; anything it still writes lapses on its own.
        if let Some(mut renewal) = entry.renewal {
            match tokio::time::timeout(self.config.ttl, &mut renewal).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(lease_id = id, error = %e, "Renewal task ended abnormally");
                }
                Err(_) => {
                    renewal.abort();
                    warn!(
                        lease_id = id,
                        key = %entry.key,
                        waited_ms = self.config.ttl.as_millis() as u64,
                        "Renewal write still in flight, deleting anyway"
                    );
                }
            }
        }

        self.store.delete(&entry.key).await.inspect_err(|e| {
            warn!(lease_id = id, key = %entry.key, error = %e, "Failed to delete lease key");
        })?;

        events::lease_released(id, &entry.name, &entry.key);
        Ok(())
    }

    /// Drop an entry whose first write failed or was pre-empted by close
    async fn abandon(&self, id: LeaseId, key: &str) {
        if let Some(entry) = self.entries.lock().remove(&id) {
            entry.cancel.cancel();
        }
        self.delete_quietly(id, key).await;
        metrics::set_active_leases(self.len());
    }

    async fn delete_quietly(&self, id: LeaseId, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            debug!(lease_id = id, key = %key, error = %e, "Cleanup delete failed");
        }
    }
}

impl Drop for LeaseManager {
    /// Stop renewing without deleting anything: keys lapse after their TTL
    fn drop(&mut self) {
        for entry in self.entries.get_mut().values() {
            entry.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn manager() -> (Arc<MemoryStore>, LeaseManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = LeaseManager::new(store.clone(), LeaseConfig::default());
        (store, manager)
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_writes_and_activates() {
        let (store, manager) = manager();
        let id = manager
            .acquire("api", "services/rr/api/a".to_string(), b"{}".to_vec())
            .await
            .unwrap();

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.ttl("services/rr/api/a"), Some(Duration::from_secs(10)));

        let leases = manager.leases();
        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].id, id);
        assert_eq!(leases[0].state, LeaseState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_first_write_drops_entry() {
        let (store, manager) = manager();
        store.set_available(false);

        let err = manager
            .acquire("api", "services/rr/api/a".to_string(), b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Store(StoreError::Unavailable)));
        assert!(manager.is_empty());

        // No renewal was scheduled for the failed entry
        store.set_available(true);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_with_same_key_are_independent() {
        let (store, manager) = manager();
        let first = manager
            .acquire("api", "services/rr/api/a".to_string(), b"{}".to_vec())
            .await
            .unwrap();
        let second = manager
            .acquire("api", "services/rr/api/a".to_string(), b"{}".to_vec())
            .await
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(manager.len(), 2);

        assert_eq!(manager.release("api").await.unwrap(), 2);
        assert!(manager.is_empty());
        assert!(store.scan_prefix("services/").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_only_touches_matching_name() {
        let (store, manager) = manager();
        manager
            .acquire("api", "services/rr/api/a".to_string(), b"{}".to_vec())
            .await
            .unwrap();
        manager
            .acquire("web", "services/rr/web/b".to_string(), b"{}".to_vec())
            .await
            .unwrap();

        assert_eq!(manager.release("api").await.unwrap(), 1);
        assert_eq!(manager.release("nothing").await.unwrap(), 0);

        let keys = store.scan_prefix("services/").await.unwrap();
        assert_eq!(keys, vec!["services/rr/web/b".to_string()]);
        assert_eq!(manager.leases()[0].name, "web");
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_reports_delete_failure_after_processing_all() {
        let (store, manager) = manager();
        manager
            .acquire("api", "services/rr/api/a".to_string(), b"{}".to_vec())
            .await
            .unwrap();
        manager
            .acquire("api", "services/rr/api/b".to_string(), b"{}".to_vec())
            .await
            .unwrap();

        store.set_available(false);
        assert!(manager.release("api").await.is_err());
        assert!(manager.is_empty());

        // Both renewal loops are gone even though the deletes failed
        store.set_available(true);
        let writes = store.write_count();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_refuses_new_leases() {
        let (store, manager) = manager();
        manager
            .acquire("api", "services/rr/api/a".to_string(), b"{}".to_vec())
            .await
            .unwrap();

        assert_eq!(manager.close().await.unwrap(), 1);
        assert!(manager.is_closed());
        assert!(store.scan_prefix("services/").await.unwrap().is_empty());

        let err = manager
            .acquire("api", "services/rr/api/a".to_string(), b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_renewals_but_keeps_keys() {
        let (store, manager) = manager();
        manager
            .acquire("api", "services/rr/api/a".to_string(), b"{}".to_vec())
            .await
            .unwrap();
        drop(manager);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(store.scan_prefix("services/").await.unwrap().len(), 1);
        assert_eq!(store.write_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.scan_prefix("services/").await.unwrap().is_empty());
    }
}
