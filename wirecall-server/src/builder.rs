//! Server builder
//!
//! Fluent configuration for a [`WirecallServer`]:
//! - bind address
//! - method registry (or individual handlers)
//! - connection tuning: admission limit, sink capacity, handler deadline
//! - internal fault exposure
//! - observability
//!
//! # Examples
//!
//! ```rust,no_run
//! use wirecall_server::{from_fn, WirecallServer};
//! use std::time::Duration;
//!
//! # async fn example() -> wirecall_core::Result<()> {
//! let server = WirecallServer::builder()
//!     .bind_str("127.0.0.1:8080")?
//!     .handler("ping", from_fn(|_ctx| async {}))
//!     .max_in_flight(64)
//!     .handler_timeout(Duration::from_secs(30))
//!     .expose_internal_errors(false)
//!     .with_default_observability()
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::connection::ConnectionOptions;
use crate::dispatch::Dispatcher;
use crate::handler::MethodDescriptor;
use crate::metrics::ServerMetrics;
use crate::registry::Registry;
use crate::WirecallServer;
use std::net::SocketAddr;
use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wirecall_core::{Error, ObservabilityConfig, Result};

/// Builder for constructing a server
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    registry: Registry,
    expose_internal_errors: bool,
    options: ConnectionOptions,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    shutdown: Option<CancellationToken>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            addr: None,
            registry: Registry::new(),
            expose_internal_errors: true,
            options: ConnectionOptions::default(),
            observability_config: None,
            service_name: None,
            shutdown: None,
        }
    }

    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Set the bind address from a string (e.g., "127.0.0.1:8080")
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;
        self.addr = Some(addr);
        Ok(self)
    }

    /// Register a single method
    pub fn handler(mut self, method: impl Into<String>, descriptor: MethodDescriptor) -> Self {
        self.registry.register(method, descriptor);
        self
    }

    /// Set the registry (replaces any previously registered handlers)
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Report raw panic text to clients (default) or a generic message
    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    /// Limit concurrently running handlers per connection (default: unlimited)
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.options.max_in_flight = Some(limit);
        self
    }

    /// Responses buffered per connection ahead of the writer (default: 16)
    pub fn sink_capacity(mut self, capacity: usize) -> Self {
        self.options.sink_capacity = capacity;
        self
    }

    /// Deadline handed to every handler through its call context
    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.options.handler_timeout = Some(timeout);
        self
    }

    /// Replace all connection options at once
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Enable observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Drive shutdown from an external token instead of a fresh one
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Validate the configuration and bind the listener
    ///
    /// # Errors
    ///
    /// `Error::Config` for a missing address, a zero sink capacity or
    /// admission limit, or failed observability setup; `Error::Io` if the
    /// address cannot be bound.
    pub async fn build(self) -> Result<WirecallServer> {
        let addr = self
            .addr
            .ok_or_else(|| Error::Config("No bind address specified".to_string()))?;
        self.options.validate()?;

        let listener = TcpListener::bind(addr).await?;

        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            wirecall_core::init_observability(config.clone()).map_err(|e| {
                Error::Config(format!("Failed to initialize observability: {}", e))
            })?;

            Some(Arc::new(ServerMetrics::new(config.service_name)))
        } else {
            None
        };

        let mut dispatcher =
            Dispatcher::new(self.registry).expose_internal_errors(self.expose_internal_errors);
        if let Some(ref metrics) = metrics {
            dispatcher = dispatcher.with_metrics(Arc::clone(metrics));
        }

        tracing::info!(
            addr = %addr,
            methods = dispatcher.registry().len(),
            "Server listening"
        );

        Ok(WirecallServer {
            listener,
            dispatcher,
            options: self.options,
            metrics,
            shutdown: self.shutdown.unwrap_or_default(),
            active: Arc::new(AtomicI64::new(0)),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;

    #[tokio::test]
    async fn test_builder_basic() {
        let server = ServerBuilder::new()
            .bind_str("127.0.0.1:0")
            .unwrap()
            .handler("test", from_fn(|_ctx| async {}))
            .build()
            .await
            .unwrap();

        assert!(server.registry().contains("test"));
        assert!(server.local_addr().is_ok());
    }

    #[tokio::test]
    async fn test_builder_no_address() {
        let result = ServerBuilder::new().build().await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_sink() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let result = ServerBuilder::new().bind(addr).sink_capacity(0).build().await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_in_flight() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let result = ServerBuilder::new().bind(addr).max_in_flight(0).build().await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_builder_connection_options() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let server = ServerBuilder::new()
            .bind(addr)
            .max_in_flight(8)
            .sink_capacity(4)
            .handler_timeout(Duration::from_millis(250))
            .expose_internal_errors(false)
            .build()
            .await
            .unwrap();

        assert_eq!(server.options.max_in_flight, Some(8));
        assert_eq!(server.options.sink_capacity, 4);
        assert_eq!(server.options.handler_timeout, Some(Duration::from_millis(250)));
        assert!(!server.dispatcher.exposes_internal_errors());
    }

    #[test]
    fn test_builder_bind_str_invalid() {
        let result = ServerBuilder::new().bind_str("invalid:address");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_default() {
        let builder = ServerBuilder::default();
        assert!(builder.addr.is_none());
        assert!(builder.expose_internal_errors);
        assert_eq!(builder.options, ConnectionOptions::default());
    }
}
