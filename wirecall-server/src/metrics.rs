//! Server metrics definitions
//!
//! OpenTelemetry instruments recorded by the dispatcher and the accept loop.
//! They are created against the global meter, so nothing is exported unless
//! observability was initialized with metrics enabled.
//!
//! # Metrics Collected
//!
//! - **connections_active**: connections currently being served (gauge)
//! - **connections_total**: connections accepted since startup (counter)
//! - **requests_total**: requests dispatched, by method and status (counter)
//! - **request_duration**: handler latency in seconds (histogram)
//! - **errors_total**: error responses, by failure category (counter)
//! - **panics_total**: faults caught inside dispatch units (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use wirecall_server::ServerMetrics;
//!
//! let metrics = ServerMetrics::new("my-service");
//! metrics.record_connection(5);
//! metrics.record_request("echo", "success", 0.025);
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Server metrics for monitoring
///
/// All instruments are named `wirecall.server.*`.
pub struct ServerMetrics {
    pub connections_active: Gauge<i64>,
    pub connections_total: Counter<u64>,
    pub requests_total: Counter<u64>,
    /// Request processing duration in seconds
    pub request_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub panics_total: Counter<u64>,
}

impl ServerMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        // global::meter needs a 'static name
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connections_active: meter
                .i64_gauge("wirecall.server.connections.active")
                .with_description("Number of connections currently served")
                .build(),
            connections_total: meter
                .u64_counter("wirecall.server.connections.total")
                .with_description("Total number of connections accepted")
                .build(),
            requests_total: meter
                .u64_counter("wirecall.server.requests.total")
                .with_description("Total number of requests dispatched")
                .build(),
            request_duration: meter
                .f64_histogram("wirecall.server.request.duration")
                .with_description("Request processing duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("wirecall.server.errors.total")
                .with_description("Total number of error responses")
                .build(),
            panics_total: meter
                .u64_counter("wirecall.server.panics.total")
                .with_description("Total number of faults caught in handlers")
                .build(),
        }
    }

    pub fn record_connection(&self, active: i64) {
        self.connections_active.record(active, &[]);
        self.connections_total.add(1, &[]);
    }

    pub fn record_disconnection(&self, active: i64) {
        self.connections_active.record(active, &[]);
    }

    /// Record a finished request; `status` is "success" or "error"
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record an error response by category (see `DispatchError::kind`)
    pub fn record_error(&self, kind: &str) {
        let attributes = &[KeyValue::new("kind", kind.to_string())];
        self.errors_total.add(1, attributes);
    }

    pub fn record_panic(&self, method: &str) {
        let attributes = &[KeyValue::new("method", method.to_string())];
        self.panics_total.add(1, attributes);
    }
}

impl std::fmt::Debug for ServerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMetrics").finish_non_exhaustive()
    }
}
