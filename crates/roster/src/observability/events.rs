//! Structured Events
//!
//! Lease lifecycle events with consistent field naming, so log pipelines can
//! follow a single registration from join to release.
//!
//! Event types:
//! - `lease_acquired` - first write succeeded, renewals scheduled
//! - `lease_registration_failed` - first write failed, entry dropped
//! - `lease_renewal_failed` - renewal write failed, backing off
//! - `lease_released` - lease cancelled and its key deleted

use std::time::Duration;
use tracing::{info, warn};

/// Emit a lease acquired event
pub fn lease_acquired(lease_id: u64, name: &str, key: &str, url: &str) {
    info!(
        event_type = "lease_acquired",
        lease_id = lease_id,
        service = %name,
        key = %key,
        url = %url,
        "Service joined"
    );
}

/// Emit a registration failure event
pub fn lease_registration_failed(lease_id: u64, name: &str, key: &str, error: &str) {
    warn!(
        event_type = "lease_registration_failed",
        lease_id = lease_id,
        service = %name,
        key = %key,
        error = %error,
        "Service registration failed"
    );
}

/// Emit a renewal failure event
pub fn lease_renewal_failed(lease_id: u64, key: &str, error: &str, retry_in: Duration) {
    warn!(
        event_type = "lease_renewal_failed",
        lease_id = lease_id,
        key = %key,
        error = %error,
        retry_in_ms = retry_in.as_millis() as u64,
        "Lease renewal failed, backing off"
    );
}

/// Emit a lease released event
pub fn lease_released(lease_id: u64, name: &str, key: &str) {
    info!(
        event_type = "lease_released",
        lease_id = lease_id,
        service = %name,
        key = %key,
        "Service left"
    );
}
