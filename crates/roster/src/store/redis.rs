//! Redis storage backend
//!
//! A single multiplexed `ConnectionManager` is shared by every operation and
//! reconnects on its own after transport failures.

use super::KvStore;
use crate::config::{ConnectBackoff, RegistryConfig};
use crate::error::StoreError;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use redis::aio::ConnectionManager;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Keys requested per SCAN round trip
const SCAN_COUNT: usize = 500;

/// Redis-backed [`KvStore`]
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the store described by `config`, retrying with exponential backoff
    pub async fn connect(config: &RegistryConfig) -> Result<Self, StoreError> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                db: config.options.db,
                username: config.options.username.clone(),
                password: config.options.password.clone(),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info)?;
        let conn = connect_with_backoff(client, &config.connect_backoff).await?;

        info!(host = %config.host, port = config.port, "Connected to redis");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager
    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

async fn connect_with_backoff(
    client: redis::Client,
    policy: &ConnectBackoff,
) -> Result<ConnectionManager, StoreError> {
    let backoff = ExponentialBackoff {
        initial_interval: policy.initial,
        current_interval: policy.initial,
        max_interval: policy.max,
        max_elapsed_time: Some(policy.max_elapsed),
        multiplier: policy.multiplier,
        ..Default::default()
    };

    retry(backoff, || async {
        match ConnectionManager::new(client.clone()).await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                warn!(error = %e, "redis connection failed, retrying");
                Err(backoff::Error::transient(e))
            }
        }
    })
    .await
    .map_err(|e| StoreError::Connect(e.to_string()))
}

#[async_trait]
impl KvStore for RedisStore {
    async fn put_leased(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let ttl_ms = expiry_millis(ttl);

        let _: () = redis::pipe()
            .atomic()
            .set(key, value)
            .ignore()
            .pexpire(key, ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await?;

        trace!(key = %key, ttl_ms = ttl_ms, "Lease written");
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", escape_glob(prefix));

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;

            // SCAN may return a key more than once across iterations
            for key in batch {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern = %pattern, key_count = keys.len(), "Scanned keys");
        Ok(keys)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        trace!(key = %key, "Key deleted");
        Ok(())
    }
}

/// `PEXPIRE` argument for `ttl`: whole milliseconds, never zero
fn expiry_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

/// Escape glob metacharacters so a literal prefix can be used in `MATCH`
fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
