//! Service Registry
//!
//! Processes `join` under a logical name, keep their lease alive in the
//! background, and `leave` when they shut down. Other processes `list` or
//! `lookup` live instances by name. Liveness is the presence of the lease key:
//! there is no separate health check.

mod lookup;

use crate::address;
use crate::config::RegistryConfig;
use crate::error::{ConfigError, Result};
use crate::lease::{LeaseInfo, LeaseManager};
use crate::observability::events;
use crate::store::{KvStore, RedisStore};
use roster_core::{encode, DescriptorInput, KeySpace, ServiceDescriptor};
use std::sync::Arc;
use tracing::info;

/// Handle to a registry. Cheap to clone; all clones share the same leases.
///
/// Dropping the last handle stops every renewal without deleting keys, so
/// instances disappear once their TTL runs out. Call [`Registry::close`] for a
/// clean departure.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    store: Arc<dyn KvStore>,
    keys: KeySpace,
    interface: Option<String>,
    leases: LeaseManager,
}

impl Registry {
    /// Validate `config` and connect to the Redis store it describes
    pub async fn connect(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let store = RedisStore::connect(&config).await?;
        Ok(Self::with_store(&config, Arc::new(store))?)
    }

    /// Build a registry over an already established store handle.
    ///
    /// Several registries may share one store. The store location fields of
    /// `config` are ignored here; namespace, interface and lease timing apply.
    pub fn with_store(
        config: &RegistryConfig,
        store: Arc<dyn KvStore>,
    ) -> std::result::Result<Self, ConfigError> {
        config.lease.validate()?;

        let keys = KeySpace::new(&config.namespace);
        info!(namespace = %keys.namespace(), ttl_ms = config.lease.ttl.as_millis() as u64, "Registry created");

        Ok(Self {
            inner: Arc::new(RegistryInner {
                leases: LeaseManager::new(store.clone(), config.lease),
                store,
                keys,
                interface: config.interface.clone(),
            }),
        })
    }

    /// Advertise an instance of `name` and keep its lease alive.
    ///
    /// `input` may be a full [`DescriptorInput`], `DescriptorInput::default()`,
    /// or a bare port number. Returns the descriptor as stored.
    pub async fn join(
        &self,
        name: &str,
        input: impl Into<DescriptorInput>,
    ) -> Result<ServiceDescriptor> {
        let interface = self.inner.interface.as_deref();
        let descriptor =
            ServiceDescriptor::resolve(name, input.into(), || address::local_hostname(interface));

        let key = self.inner.keys.storage_key(name, &descriptor.url);
        let value = encode(&descriptor)?;

        let lease_id = self
            .inner
            .leases
            .acquire(name, key.clone(), value)
            .await?;
        events::lease_acquired(lease_id, name, &key, &descriptor.url);

        Ok(descriptor)
    }

    /// Withdraw every instance this process registered under `name`.
    ///
    /// Returns how many leases were released; zero when none matched.
    pub async fn leave(&self, name: &str) -> Result<usize> {
        Ok(self.inner.leases.release(name).await?)
    }

    /// All live instances of `name`, or of every service when `name` is `None`.
    /// Order is whatever the store returns.
    pub async fn list(&self, name: Option<&str>) -> Result<Vec<ServiceDescriptor>> {
        Ok(lookup::list(self.inner.store.as_ref(), &self.inner.keys, name).await?)
    }

    /// One live instance of `name` chosen uniformly at random, `None` if there are none
    pub async fn lookup(&self, name: Option<&str>) -> Result<Option<ServiceDescriptor>> {
        let list = self.list(name).await?;
        Ok(lookup::pick_random(list))
    }

    /// Release every lease and reject further joins
    pub async fn close(&self) -> Result<usize> {
        Ok(self.inner.leases.close().await?)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.leases.is_closed()
    }

    /// Leases held by this process, in join order
    pub fn active_leases(&self) -> Vec<LeaseInfo> {
        self.inner.leases.leases()
    }

    pub fn key_space(&self) -> &KeySpace {
        &self.inner.keys
    }
}
