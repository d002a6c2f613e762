//! Metrics collection and exposition.
//!
//! # Metrics
//! - `node_heartbeat_probes_total` (counter): probes by peer and result
//! - `node_peer_active` (gauge): 1 = active, 0 = inactive, per peer
//! - `node_auth_rejections_total` (counter): requests refused by the realm
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one heartbeat probe outcome.
pub fn record_probe(peer: &str, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!(
        "node_heartbeat_probes_total",
        "peer" => peer.to_string(),
        "result" => result
    )
    .increment(1);
    gauge!("node_peer_active", "peer" => peer.to_string()).set(if success { 1.0 } else { 0.0 });
}

/// Record a request refused for missing or wrong credentials.
pub fn record_auth_rejection() {
    counter!("node_auth_rejections_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_probe("slave-a", true);
        record_probe("slave-a", false);
        record_auth_rejection();
    }
}
