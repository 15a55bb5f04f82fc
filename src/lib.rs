//! wirecall - concurrent request dispatch over persistent connections
//!
//! Convenience crate re-exporting the wirecall sub-crates.
//!
//! # Architecture
//!
//! - **wirecall-core**: envelopes, codec, error types, observability setup
//! - **wirecall-server**: registry, handlers, dispatcher, connection
//!   lifecycle, transports and the WebSocket server
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wirecall::WirecallServer;
//! use wirecall::server::{from_fn, from_typed_fn, MethodResult};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i32, b: i32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = WirecallServer::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .handler("ping", from_fn(|_ctx| async {}))
//!         .handler("add", from_typed_fn(|_ctx, p: AddParams| async move {
//!             MethodResult::Ok(p.a + p.b)
//!         }))
//!         .build()
//!         .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub use wirecall_core as core;
pub use wirecall_server as server;

pub use wirecall_core::{Id, Request, Response};
pub use wirecall_server::WirecallServer;
