//! Lease Renewal Task
//!
//! One task per active lease rewrites the key before it can expire. A failed
//! write does not end the loop; it only pushes the next attempt out to the
//! backoff interval.

use crate::config::LeaseConfig;
use crate::error::StoreError;
use crate::observability::{events, metrics};
use crate::store::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::LeaseId;

/// Everything a renewal task needs to rewrite one lease
pub(super) struct Renewal {
    pub lease_id: LeaseId,
    pub key: String,
    pub value: Vec<u8>,
    pub store: Arc<dyn KvStore>,
    pub config: LeaseConfig,
    pub cancel: CancellationToken,
}

/// Delay before the next renewal, given the outcome of the last one
pub(super) fn next_delay(result: &Result<(), StoreError>, config: &LeaseConfig) -> Duration {
    match result {
        Ok(()) => config.renew_interval,
        Err(_) => config.backoff_interval,
    }
}

/// Spawn the renewal loop. The first renewal fires one renew interval after
/// the registration write that preceded this call.
pub(super) fn spawn_renewal(renewal: Renewal) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let Renewal {
            lease_id,
            key,
            value,
            store,
            config,
            cancel,
        } = renewal;
        let mut delay = config.renew_interval;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let result = store.put_leased(&key, &value, config.ttl).await;

            // A write in flight when the lease was released still lands, but
            // must not schedule another one
            if cancel.is_cancelled() {
                trace!(lease_id = lease_id, key = %key, "Lease released during renewal");
                break;
            }

            delay = next_delay(&result, &config);
            match result {
                Ok(()) => {
                    metrics::record_renewal(true);
                    debug!(
                        lease_id = lease_id,
                        key = %key,
                        next_in_ms = delay.as_millis() as u64,
                        "Lease renewed"
                    );
                }
                Err(e) => {
                    metrics::record_renewal(false);
                    events::lease_renewal_failed(lease_id, &key, &e.to_string(), delay);
                }
            }
        }

        trace!(lease_id = lease_id, key = %key, "Renewal task stopped");
    })
}
