//! Concurrent request dispatch over persistent connections
//!
//! A client sends `{id, method, params}` requests over a long-lived
//! connection; every request is dispatched to the handler registered under
//! its method name on its own task, and exactly one `{id, result?, error?}`
//! response goes back. Responses are written as handlers finish, so they may
//! arrive out of order: clients correlate by id.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use wirecall_server::{from_fn, from_typed_fn, MethodResult, WirecallServer};
//!
//! #[derive(Deserialize)]
//! struct EchoParams {
//!     #[serde(rename = "Msg")]
//!     msg: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = WirecallServer::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .handler("ping", from_fn(|_ctx| async {}))
//!         .handler("echo", from_typed_fn(|_ctx, p: EchoParams| async move {
//!             MethodResult::Ok(p.msg)
//!         }))
//!         .build()
//!         .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Accept loop** ([`WirecallServer::run`]): accepts TCP connections,
//!   upgrades them to WebSocket and hands each to [`serve_connection`].
//! - **Connection**: one lifecycle task reading requests, one writer task.
//! - **Dispatch units**: one task per request, each wrapped in a
//!   `catch_unwind` boundary so a panicking handler answers its own request
//!   with an error and leaves everything else running.
//!
//! [`serve_connection`] works with any [`Transport`]; besides WebSocket the
//! crate ships a JSON-lines transport for stdio or raw sockets.

mod builder;
mod connection;
mod context;
mod dispatch;
mod handler;
mod metrics;
mod reader;
mod registry;
pub mod transport;
mod writer;

pub use builder::ServerBuilder;
pub use connection::{
    serve_connection, ConnectionOptions, ConnectionSummary, DEFAULT_SINK_CAPACITY,
};
pub use context::CallContext;
pub use dispatch::Dispatcher;
pub use handler::{
    from_fn, from_method, from_typed_fn, from_typed_method, BoundCall, Handler, HandlerError,
    HandlerFuture, IntoOutcome, MethodDescriptor, MethodResult, Outcome, TypedHandler,
};
pub use metrics::ServerMetrics;
pub use reader::{ReadEnd, RequestReader};
pub use registry::{Registry, RegistryBuilder};
pub use transport::{
    FrameReader, FrameWriter, LinesTransport, Transport, WebSocketTransport,
};
pub use writer::{write_responses, WriterSummary};

pub use tokio_util::sync::CancellationToken;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::task::TaskTracker;
use wirecall_core::Result;

/// WebSocket request server
///
/// # Lifecycle
///
/// 1. **Build**: `WirecallServer::builder()...build().await` binds the
///    listener.
/// 2. **Run**: `run()` accepts connections until shutdown.
/// 3. **Shutdown**: `shutdown()` stops accepting and tells every connection
///    to stop reading; in-flight requests on those connections are still
///    answered, and `run()` returns only once every connection has finished.
pub struct WirecallServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
    options: ConnectionOptions,
    metrics: Option<Arc<ServerMetrics>>,
    shutdown: CancellationToken,
    active: Arc<AtomicI64>,
}

impl WirecallServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Accept and serve connections until the shutdown token is cancelled
    ///
    /// Each connection runs on its own task. A failed WebSocket handshake
    /// only affects that connection. Before returning, waits for every
    /// connection task to drain its in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to accept.
    #[tracing::instrument(skip(self), name = "server.run")]
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting wirecall server");

        let conn_counter = AtomicU64::new(0);
        let connections = TaskTracker::new();

        let result = loop {
            let (stream, addr) = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::error!(error = %e, "Accept failed");
                        // Open connections stop reading and drain like on shutdown
                        self.shutdown.cancel();
                        break Err(e.into());
                    }
                },
            };

            let conn_id = conn_counter.fetch_add(1, Ordering::SeqCst);
            let dispatcher = self.dispatcher.clone();
            let options = self.options.clone();
            let cancel = self.shutdown.clone();
            let metrics = self.metrics.clone();
            let active = Arc::clone(&self.active);

            tracing::info!(conn_id, addr = %addr, "New connection accepted");

            let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(ref m) = metrics {
                m.record_connection(now_active);
            }

            connections.spawn(async move {
                match WebSocketTransport::accept(stream).await {
                    Ok(transport) => {
                        serve_connection(transport, dispatcher, options, conn_id, cancel).await;
                    }
                    Err(e) => {
                        tracing::error!(conn_id, error = %e, "WebSocket handshake failed");
                    }
                }

                let remaining = active.fetch_sub(1, Ordering::SeqCst) - 1;
                if let Some(ref m) = metrics {
                    m.record_disconnection(remaining);
                }
            });
        };

        connections.close();
        tracing::info!(pending = connections.len(), "Waiting for open connections to drain");
        connections.wait().await;
        tracing::info!("All connections closed");

        result
    }

    /// Stop accepting connections and stop reading on open ones
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Token cancelled on shutdown; usable to trigger shutdown from elsewhere
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Registry {
        self.dispatcher.registry()
    }

    /// Connections currently being served
    pub fn active_connections(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }
}
