//! Metrics collection and exposition.
//!
//! # Metrics
//! - `node_bootstrap_stage_total` (counter): committed bootstrap stages by stage
//! - `node_teardown_failures_total` (counter): failed teardown steps by component
//! - `node_reconnect_fanouts_total` (counter): connectivity edges that triggered reconnects
//! - `node_reconnect_failures_total` (counter): failed client reconnects by client
//! - `node_telemetry_events_total` (counter): telemetry sends by event and outcome
//! - `node_bus_events_total` (counter): published events by topic

use std::sync::OnceLock;

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once per process and return its handle.
pub fn install_prometheus() -> Option<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS.get() {
        return Some(handle.clone());
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(PROMETHEUS.get_or_init(|| handle).clone()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install metrics recorder");
            None
        }
    }
}

pub fn record_stage_committed(stage: &'static str) {
    counter!("node_bootstrap_stage_total", "stage" => stage).increment(1);
}

pub fn record_teardown_failure(component: &'static str) {
    counter!("node_teardown_failures_total", "component" => component).increment(1);
}

pub fn record_reconnect_fanout() {
    counter!("node_reconnect_fanouts_total").increment(1);
}

pub fn record_reconnect_failure(client: &'static str) {
    counter!("node_reconnect_failures_total", "client" => client).increment(1);
}

pub fn record_telemetry_event(event: &'static str, delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!("node_telemetry_events_total", "event" => event, "outcome" => outcome).increment(1);
}

pub fn record_bus_event(topic: &'static str) {
    counter!("node_bus_events_total", "topic" => topic).increment(1);
}
