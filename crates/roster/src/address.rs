//! Local address discovery
//!
//! Used to default the `hostname` of descriptors that do not carry one.

use std::net::IpAddr;
use tracing::{debug, warn};

const LOOPBACK: &str = "127.0.0.1";

/// First non-loopback IPv4 address of `interface` (or of any interface)
pub fn local_hostname(interface: Option<&str>) -> String {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => pick_address(&interfaces, interface).unwrap_or_else(|| {
            debug!(interface = ?interface, "No external IPv4 address found, using loopback");
            LOOPBACK.to_string()
        }),
        Err(e) => {
            warn!(error = %e, "Failed to enumerate network interfaces");
            LOOPBACK.to_string()
        }
    }
}

fn pick_address(interfaces: &[(String, IpAddr)], wanted: Option<&str>) -> Option<String> {
    interfaces
        .iter()
        .filter(|(name, _)| wanted.map_or(true, |w| w == name))
        .find(|(_, ip)| ip.is_ipv4() && !ip.is_loopback())
        .map(|(_, ip)| ip.to_string())
}
