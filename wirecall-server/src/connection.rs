//! Connection lifecycle
//!
//! [`serve_connection`] owns one connection from start to finish.
//!
//! # Task Model
//!
//! - **Lifecycle task** (the caller): reads requests one at a time and
//!   spawns a dispatch unit per request.
//! - **Writer task**: drains the response sink onto the connection.
//! - **Dispatch units**: one task per request, each holding a clone of the
//!   sink sender and emitting exactly one response.
//!
//! # Shutdown
//!
//! When reading ends (EOF, a decode failure, or cancellation) the lifecycle
//! task drops its own sink sender. The sink closes once the last in-flight
//! unit has emitted, the writer closes the connection, and only then does
//! `serve_connection` return. A handler that never finishes therefore keeps
//! the connection open: the engine signals cancellation through the
//! [`CallContext`](crate::CallContext) but never aborts a running handler.

use crate::context::CallContext;
use crate::dispatch::Dispatcher;
use crate::reader::{ReadEnd, RequestReader};
use crate::transport::Transport;
use crate::writer::write_responses;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wirecall_core::{Error, Result};

/// Default number of completed responses that may wait for the writer
pub const DEFAULT_SINK_CAPACITY: usize = 16;

/// Per-connection tuning
///
/// # Defaults
///
/// - `max_in_flight`: `None` (one task per request, no limit)
/// - `sink_capacity`: 16
/// - `handler_timeout`: `None` (no deadline in the call context)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Upper bound on concurrently running dispatch units
    ///
    /// When reached, the reader waits for a unit to finish before reading
    /// the next request.
    pub max_in_flight: Option<usize>,
    /// Capacity of the response sink; a full sink suspends emitting units
    pub sink_capacity: usize,
    /// Deadline given to each handler, measured from dispatch
    pub handler_timeout: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_in_flight: None,
            sink_capacity: DEFAULT_SINK_CAPACITY,
            handler_timeout: None,
        }
    }
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    pub fn sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = capacity;
        self
    }

    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    /// Reject settings that would stall every connection
    pub fn validate(&self) -> Result<()> {
        if self.sink_capacity == 0 {
            return Err(Error::Config("sink_capacity must be at least 1".into()));
        }
        if self.max_in_flight == Some(0) {
            return Err(Error::Config("max_in_flight must be at least 1".into()));
        }
        Ok(())
    }
}

/// What happened on a connection, returned once it is fully torn down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    /// Requests read and dispatched
    pub requests: u64,
    pub responses_written: u64,
    pub write_failures: u64,
    pub read_end: ReadEnd,
}

/// Serve requests on a connection until its input ends and all responses
/// are written
///
/// `cancel` is the caller's token. A child of it goes into every handler's
/// [`CallContext`]; cancelling it also stops reading, after which in-flight
/// units still drain normally.
#[tracing::instrument(skip(transport, dispatcher, options, cancel))]
pub async fn serve_connection<T: Transport>(
    transport: T,
    dispatcher: Dispatcher,
    options: ConnectionOptions,
    conn_id: u64,
    cancel: CancellationToken,
) -> ConnectionSummary {
    let (reader, writer) = transport.split();

    // mpsc::channel and Semaphore reject zero; validated options never have it
    let (sink, rx) = mpsc::channel(options.sink_capacity.max(1));
    let writer_task = tokio::spawn(write_responses(writer, rx, conn_id));
    let limiter = options
        .max_in_flight
        .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

    let conn_token = cancel.child_token();
    let mut reader = RequestReader::new(reader, conn_id);
    let mut requests = 0u64;

    tracing::info!("Connection opened");

    loop {
        let next = tokio::select! {
            biased;
            _ = conn_token.cancelled() => None,
            request = reader.next() => Some(request),
        };

        let request = match next {
            Some(Some(request)) => request,
            Some(None) => break,
            None => {
                reader.mark_cancelled();
                break;
            }
        };
        requests += 1;

        let permit = match limiter {
            Some(ref semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };

        let deadline = options.handler_timeout.map(|timeout| Instant::now() + timeout);
        let ctx = CallContext::new(
            conn_token.clone(),
            deadline,
            request.id.clone(),
            request.method.clone(),
            conn_id,
        );
        dispatcher.spawn(request, ctx, sink.clone(), permit);
    }

    let read_end = reader.finish();
    tracing::debug!(requests, ?read_end, "Request stream ended, draining in-flight requests");

    // The writer finishes once this and every unit's sender are gone
    drop(sink);
    let written = match writer_task.await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "Writer task failed");
            Default::default()
        }
    };

    tracing::info!(
        requests,
        responses = written.written,
        write_failures = written.failed,
        ?read_end,
        "Connection closed"
    );

    ConnectionSummary {
        requests,
        responses_written: written.written,
        write_failures: written.failed,
        read_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;
    use crate::registry::Registry;
    use crate::transport::LinesTransport;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_default_options() {
        let options = ConnectionOptions::default();
        assert_eq!(options.max_in_flight, None);
        assert_eq!(options.sink_capacity, 16);
        assert_eq!(options.handler_timeout, None);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_invalid_options() {
        assert!(ConnectionOptions::new().sink_capacity(0).validate().is_err());
        assert!(ConnectionOptions::new().max_in_flight(0).validate().is_err());
        assert!(ConnectionOptions::new()
            .max_in_flight(4)
            .sink_capacity(1)
            .handler_timeout(Duration::from_secs(1))
            .validate()
            .is_ok());
    }

    #[tokio::test]
    async fn test_serve_until_eof() {
        let registry = Registry::builder()
            .handler("ping", from_fn(|_ctx| async {}))
            .build();
        let input: &[u8] = b"{\"id\":1,\"method\":\"ping\"}\n";
        let (out_local, mut out_remote) = tokio::io::duplex(1024);

        let summary = serve_connection(
            LinesTransport::new(input, out_local),
            Dispatcher::new(registry),
            ConnectionOptions::default(),
            1,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(summary.requests, 1);
        assert_eq!(summary.responses_written, 1);
        assert_eq!(summary.read_end, ReadEnd::Eof);

        let mut out = String::new();
        out_remote.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "{\"id\":1}\n");
    }

    #[tokio::test]
    async fn test_handler_sees_deadline() {
        let registry = Registry::builder()
            .handler("check", from_fn(|ctx: CallContext| async move {
                if ctx.deadline().is_some() {
                    Ok(())
                } else {
                    Err("no deadline")
                }
            }))
            .build();
        let input: &[u8] = b"{\"id\":1,\"method\":\"check\"}\n";
        let (out_local, mut out_remote) = tokio::io::duplex(1024);

        serve_connection(
            LinesTransport::new(input, out_local),
            Dispatcher::new(registry),
            ConnectionOptions::new().handler_timeout(Duration::from_secs(30)),
            1,
            CancellationToken::new(),
        )
        .await;

        let mut out = String::new();
        out_remote.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "{\"id\":1}\n");
    }
}
