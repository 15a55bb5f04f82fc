//! WebSocket echo server
//!
//! Serves `ping`, `echo`, `add` and `slow` over WebSocket on 127.0.0.1:9010.
//!
//! Run with: cargo run --example echo_server
//!
//! Then, with any WebSocket client (e.g. `websocat ws://127.0.0.1:9010`):
//!
//! ```text
//! {"id":1,"method":"ping"}
//! {"id":3,"method":"echo","params":{"Msg":"hi"}}
//! {"id":4,"method":"add","params":{"a":2,"b":3}}
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use wirecall::core::ObservabilityConfig;
use wirecall::server::{from_fn, from_typed_fn, CallContext, HandlerError, MethodResult};
use wirecall::WirecallServer;

#[derive(Deserialize)]
struct EchoParams {
    #[serde(rename = "Msg")]
    msg: String,
}

#[derive(Deserialize)]
struct AddParams {
    a: i64,
    b: i64,
}

#[derive(Serialize)]
struct AddResult {
    sum: i64,
}

#[derive(Deserialize)]
struct SlowParams {
    millis: u64,
}

async fn echo(_ctx: CallContext, params: EchoParams) -> MethodResult<String> {
    Ok(params.msg)
}

async fn add(_ctx: CallContext, params: AddParams) -> MethodResult<AddResult> {
    tracing::info!(a = params.a, b = params.b, "Adding numbers");
    let sum = params
        .a
        .checked_add(params.b)
        .ok_or_else(|| HandlerError::new("overflow"))?;
    Ok(AddResult { sum })
}

/// Sleeps for the requested time unless the connection goes away first
async fn slow(ctx: CallContext, params: SlowParams) -> MethodResult<u64> {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(params.millis)) => Ok(params.millis),
        _ = ctx.done() => Err(HandlerError::new("cancelled")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let otel_config = ObservabilityConfig::new("wirecall-echo")
        .with_json_logs(false)
        .with_log_level("info,wirecall_server=debug");

    let server = WirecallServer::builder()
        .bind_str("127.0.0.1:9010")?
        .handler("ping", from_fn(|_ctx| async {}))
        .handler("echo", from_typed_fn(echo))
        .handler("add", from_typed_fn(add))
        .handler("slow", from_typed_fn(slow))
        .handler_timeout(Duration::from_secs(10))
        .with_observability(otel_config)
        .build()
        .await?;

    println!("Echo server running on {}", server.local_addr()?);
    println!("Press Ctrl+C to stop");

    let token = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    server.run().await?;
    wirecall::core::shutdown_observability();
    Ok(())
}
