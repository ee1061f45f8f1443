//! Lookup Engine
//!
//! Resolves a logical name to the descriptors of its live instances with one
//! prefix scan and one batch read. Anything that expired between the two
//! round trips, or does not decode, is dropped.

use crate::error::StoreError;
use crate::observability::metrics;
use crate::store::KvStore;
use rand::Rng;
use roster_core::{decode_all, KeySpace, ServiceDescriptor};
use tracing::debug;

/// Every live descriptor under `name`, or under the whole namespace
pub(crate) async fn list(
    store: &dyn KvStore,
    keys: &KeySpace,
    name: Option<&str>,
) -> Result<Vec<ServiceDescriptor>, StoreError> {
    let prefix = keys.scan_prefix(name);
    let matched = store.scan_prefix(&prefix).await?;
    if matched.is_empty() {
        metrics::record_list_results(0);
        return Ok(Vec::new());
    }

    let raw = store.get_many(&matched).await?;
    let mut dropped = 0;
    let descriptors = decode_all(&raw, |idx, e| {
        dropped += 1;
        debug!(
            key = matched.get(idx).map(String::as_str).unwrap_or_default(),
            error = %e,
            "Skipping undecodable service record"
        );
    });

    metrics::record_decode_failures(dropped);
    metrics::record_list_results(descriptors.len());
    debug!(
        prefix = %prefix,
        matched = matched.len(),
        live = descriptors.len(),
        "Listed services"
    );

    Ok(descriptors)
}

/// Pick one descriptor uniformly at random
pub(crate) fn pick_random(mut list: Vec<ServiceDescriptor>) -> Option<ServiceDescriptor> {
    if list.is_empty() {
        return None;
    }
    let idx = rand::rng().random_range(0..list.len());
    Some(list.swap_remove(idx))
}
