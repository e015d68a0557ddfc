//! Metrics collection and exposition.
//!
//! # Metrics
//! - `controller_reloads_total` (counter): reload passes by outcome
//! - `controller_reload_callback_failures_total` (counter): failed reload callbacks
//! - `controller_shutdowns_total` (counter): teardown runs (at most one per process)
//! - `controller_listeners_active` (gauge): listeners currently serving
//! - `controller_memory_rss_bytes` (gauge): resident memory from the profiler
//!
//! Recording without an installed exporter is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Count one reload pass and its failed callbacks.
pub fn record_reload(failures: usize) {
    let outcome = if failures == 0 { "success" } else { "partial_failure" };
    metrics::counter!("controller_reloads_total", "outcome" => outcome).increment(1);
    if failures > 0 {
        metrics::counter!("controller_reload_callback_failures_total").increment(failures as u64);
    }
}

/// Count one teardown run.
pub fn record_shutdown() {
    metrics::counter!("controller_shutdowns_total").increment(1);
}

/// Number of listeners currently serving.
pub fn set_active_listeners(count: usize) {
    metrics::gauge!("controller_listeners_active").set(count as f64);
}

pub fn set_memory_rss(bytes: u64) {
    metrics::gauge!("controller_memory_rss_bytes").set(bytes as f64);
}
