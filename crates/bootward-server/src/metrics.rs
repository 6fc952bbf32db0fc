//! Prometheus metrics
//!
//! Metrics tracked:
//! - `ipxe_request_duration_seconds` - histogram of boot script requests by uuid
//! - `ignition_request_duration_seconds` - histogram of ignition requests by mac
//! - `bootward_binding_violations_total` - counter of refused binding checks
//!
//! Handlers and the boot service record through a `RequestMetrics` handed to
//! them at construction. No process-wide recorder is installed.

use metrics::{counter, describe_counter, describe_histogram, histogram, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::time::{Duration, Instant};

pub const IPXE_REQUEST_DURATION: &str = "ipxe_request_duration_seconds";
pub const IGNITION_REQUEST_DURATION: &str = "ignition_request_duration_seconds";
pub const BINDING_VIOLATIONS: &str = "bootward_binding_violations_total";

/// Sink for the service's request metrics
pub trait RequestMetrics: Send + Sync {
    fn record_ipxe_duration(&self, uuid: &str, duration: Duration);

    fn record_ignition_duration(&self, mac: &str, duration: Duration);

    fn record_binding_violation(&self);

    /// Exposition text for `/metrics`; `None` when this sink cannot be scraped
    fn render(&self) -> Option<String> {
        None
    }
}

/// Prometheus-backed metrics owned by the service
pub struct PrometheusMetrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        with_local_recorder(&recorder, register_metric_descriptions);
        Self { recorder, handle }
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn register_metric_descriptions() {
    describe_histogram!(
        IPXE_REQUEST_DURATION,
        "Duration of boot script requests in seconds"
    );
    describe_histogram!(
        IGNITION_REQUEST_DURATION,
        "Duration of ignition requests in seconds"
    );
    describe_counter!(
        BINDING_VIOLATIONS,
        "Requests refused because the caller's MAC is not bound to the machine"
    );
}

impl RequestMetrics for PrometheusMetrics {
    fn record_ipxe_duration(&self, uuid: &str, duration: Duration) {
        with_local_recorder(&self.recorder, || {
            histogram!(IPXE_REQUEST_DURATION, "uuid" => uuid.to_string())
                .record(duration.as_secs_f64());
        });
    }

    fn record_ignition_duration(&self, mac: &str, duration: Duration) {
        with_local_recorder(&self.recorder, || {
            histogram!(IGNITION_REQUEST_DURATION, "mac" => mac.to_string())
                .record(duration.as_secs_f64());
        });
    }

    fn record_binding_violation(&self) {
        with_local_recorder(&self.recorder, || {
            counter!(BINDING_VIOLATIONS).increment(1);
        });
    }

    fn render(&self) -> Option<String> {
        Some(self.handle.render())
    }
}

/// Times a request; the label may be filled in after resolution
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
