//! Logging and OpenTelemetry setup
//!
//! wirecall logs through `tracing` everywhere. This module installs the
//! global subscriber: an `EnvFilter`, a fmt layer (JSON or human readable)
//! and, when traces are enabled, a `tracing-opentelemetry` layer exporting
//! spans over OTLP/gRPC. Metrics get a periodic OTLP exporter registered as
//! the global meter provider, which is where `ServerMetrics` in
//! `wirecall-server` records.
//!
//! # Usage Pattern
//!
//! Initialize once at startup, before building a server:
//!
//! ```rust,no_run
//! use wirecall_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("echo-service")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     wirecall_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... run the server ...
//!
//!     wirecall_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: default collector endpoint
//! - `RUST_LOG`: log filter, takes precedence over the configured level

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Handles to the globally registered providers, kept for shutdown
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();
static METER_PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();

/// Observability configuration
///
/// # Defaults
///
/// - Service name: "wirecall"
/// - Service version: the crate version
/// - OTLP endpoint: `$OTEL_EXPORTER_OTLP_ENDPOINT` or "http://localhost:4317"
/// - Traces and metrics export: disabled
/// - JSON log output: enabled
/// - Log level: `$RUST_LOG` or "info"
/// - Log destination: stdout
///
/// Export is off by default so that a plain `init_observability` call only
/// sets up local logging and never tries to reach a collector.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,
    /// Service version attached to every span and metric
    pub service_version: String,
    /// gRPC endpoint of the OpenTelemetry collector
    pub otlp_endpoint: String,
    /// Export spans over OTLP
    pub enable_traces: bool,
    /// Export metrics over OTLP
    pub enable_metrics: bool,
    /// Emit log lines as JSON objects instead of human-readable text
    pub json_logs: bool,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Write log lines to stderr instead of stdout
    ///
    /// Required when stdout carries the protocol (stdio servers).
    pub log_to_stderr: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "wirecall".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: false,
            enable_metrics: false,
            json_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_to_stderr: false,
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration with a custom service name and default settings
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint (e.g. "http://collector:4317")
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the log filter directive ("info", "wirecall_server=debug", ...)
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_json_logs(mut self, enable: bool) -> Self {
        self.json_logs = enable;
        self
    }

    pub fn with_stderr_logs(mut self, enable: bool) -> Self {
        self.log_to_stderr = enable;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the global tracing subscriber and, if enabled, OTLP exporters
///
/// # Errors
///
/// Fails if an exporter cannot be built, the log filter does not parse, or
/// a global subscriber is already installed (calling this twice is an
/// error rather than a panic).
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Observability initialized"
    );

    Ok(())
}

/// Build the OTLP span pipeline and register it globally
///
/// Spans go through a batch exporter; every span is sampled.
fn init_tracer(config: &ObservabilityConfig) -> Result<opentelemetry_sdk::trace::Tracer, BoxError> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    // The subscriber layer needs a tracer before the provider goes global
    let tracer = provider.tracer(config.service_name.clone());
    register_tracer_provider(provider);

    Ok(tracer)
}

/// Build the OTLP metrics pipeline with a 30 second export interval
fn init_metrics(config: &ObservabilityConfig) -> Result<(), BoxError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(30))
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    register_meter_provider(provider);
    Ok(())
}

fn register_tracer_provider(provider: SdkTracerProvider) {
    let _ = TRACER_PROVIDER.set(provider.clone());
    global::set_tracer_provider(provider);
}

fn register_meter_provider(provider: SdkMeterProvider) {
    let _ = METER_PROVIDER.set(provider.clone());
    global::set_meter_provider(provider);
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), BoxError> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let telemetry_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let writer = || {
        if config.log_to_stderr {
            BoxMakeWriter::new(std::io::stderr)
        } else {
            BoxMakeWriter::new(std::io::stdout)
        }
    };

    let json_layer = config.json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer())
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
    });
    let text_layer = (!config.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer())
            .with_target(true)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    Ok(())
}

/// Flush and shut down exporters
///
/// Pending batched spans and the last metrics interval are exported before
/// this returns. Call it once at the end of `main`; later calls only log.
pub fn shutdown_observability() {
    tracing::info!("Shutting down observability");

    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(provider) = METER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "wirecall");
        assert!(!config.enable_traces);
        assert!(!config.enable_metrics);
        assert!(config.json_logs);
        assert!(!config.log_to_stderr);
    }

    #[test]
    fn test_custom_config() {
        let config = ObservabilityConfig::new("test-service")
            .with_endpoint("http://custom:4317")
            .with_log_level("debug")
            .with_version("1.0.0")
            .with_traces(true)
            .with_json_logs(false)
            .with_stderr_logs(true);

        assert_eq!(config.service_name, "test-service");
        assert_eq!(config.otlp_endpoint, "http://custom:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "1.0.0");
        assert!(config.enable_traces);
        assert!(!config.json_logs);
        assert!(config.log_to_stderr);
    }

    #[test]
    fn test_init_twice_is_an_error_not_a_panic() {
        let config = ObservabilityConfig::new("test-none").with_log_level("warn");

        // The first call may lose a race with another test that installed a
        // subscriber; the second call must always report an error.
        let _ = init_observability(config.clone());
        assert!(init_observability(config).is_err());
    }

    #[test]
    fn test_shutdown_stops_registered_providers() {
        let tracer_provider = SdkTracerProvider::builder().build();
        let meter_provider = SdkMeterProvider::builder().build();
        register_tracer_provider(tracer_provider.clone());
        register_meter_provider(meter_provider.clone());

        shutdown_observability();

        // Already shut down through the registered handles
        assert!(tracer_provider.shutdown().is_err());
        assert!(meter_provider.shutdown().is_err());
    }

    #[test]
    fn test_shutdown_idempotent() {
        shutdown_observability();
        shutdown_observability();
    }
}
