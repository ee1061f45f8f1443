//! Lease Management
//!
//! A lease is a store key with an expiry, kept alive by rewriting it on a
//! fixed cadence:
//! 1. Registering: first SET+EXPIRE; failure drops the entry
//! 2. Active: renew every `renew_interval`, or `backoff_interval` after a failure
//! 3. Destroyed: cancelled by leave/close (key deleted) or by dropping the
//!    registry (key left to expire)

mod manager;
mod renewal;

pub use manager::{LeaseInfo, LeaseManager, LeaseState};

/// Process-unique identity of a lease entry
pub type LeaseId = u64;
