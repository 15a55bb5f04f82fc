//! JSON-lines server on stdin/stdout
//!
//! Reads one request per line from stdin and writes one response per line
//! to stdout; logs go to stderr.
//!
//! Run with:
//!
//! ```text
//! printf '{"id":1,"method":"ping"}\n{"id":2,"method":"upper","params":"hi"}\n' \
//!     | cargo run --example stdio_server
//! ```

use wirecall::core::ObservabilityConfig;
use wirecall::server::{
    from_fn, from_typed_fn, serve_connection, CancellationToken, ConnectionOptions, Dispatcher,
    LinesTransport, MethodResult, Registry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    wirecall::core::init_observability(
        ObservabilityConfig::new("wirecall-stdio")
            .with_json_logs(false)
            .with_stderr_logs(true)
            .with_log_level("warn"),
    )?;

    let registry = Registry::builder()
        .handler("ping", from_fn(|_ctx| async {}))
        .handler("upper", from_typed_fn(|_ctx, text: String| async move {
            MethodResult::Ok(text.to_uppercase())
        }))
        .build();

    let summary = serve_connection(
        LinesTransport::stdio(),
        Dispatcher::new(registry),
        ConnectionOptions::default(),
        0,
        CancellationToken::new(),
    )
    .await;

    tracing::info!(requests = summary.requests, read_end = ?summary.read_end, "stdin closed");
    Ok(())
}
