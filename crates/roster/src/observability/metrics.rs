//! Registry Metrics
//!
//! Metrics tracked:
//! - `roster_active_leases` - gauge of leases held by this process
//! - `roster_lease_renewals_total` - counter of renewal attempts by outcome
//! - `roster_registrations_total` - counter of initial registrations by outcome
//! - `roster_decode_failures_total` - counter of stored values dropped from listings
//! - `roster_list_results` - histogram of instances returned per listing
//!
//! Recording is a no-op until a recorder is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and serve the scrape endpoint on `listen`.
///
/// Must be called from within a tokio runtime; the exporter runs as a task.
pub fn init_metrics(listen: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    PrometheusBuilder::new().with_http_listener(listen).install()?;

    register_metric_descriptions();
    Ok(())
}

fn register_metric_descriptions() {
    describe_gauge!("roster_active_leases", "Number of leases held by this process");
    describe_counter!(
        "roster_lease_renewals_total",
        "Total number of lease renewal attempts"
    );
    describe_counter!(
        "roster_registrations_total",
        "Total number of initial registration attempts"
    );
    describe_counter!(
        "roster_decode_failures_total",
        "Stored values dropped from listings because they did not decode"
    );
    describe_histogram!(
        "roster_list_results",
        "Number of live instances returned per listing"
    );
}

/// Record the outcome of an initial registration write
pub fn record_registration(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("roster_registrations_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of a renewal write
pub fn record_renewal(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("roster_lease_renewals_total", "outcome" => outcome).increment(1);
}

/// Update the active leases gauge
pub fn set_active_leases(count: usize) {
    gauge!("roster_active_leases").set(count as f64);
}

/// Record values dropped by tolerant decoding
pub fn record_decode_failures(count: usize) {
    if count > 0 {
        counter!("roster_decode_failures_total").increment(count as u64);
    }
}

/// Record the size of a listing
pub fn record_list_results(count: usize) {
    histogram!("roster_list_results").record(count as f64);
}
