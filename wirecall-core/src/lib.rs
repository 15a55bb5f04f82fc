//! Core envelope types and codec for wirecall
//!
//! This crate provides the foundational pieces shared by every wirecall
//! component:
//!
//! - **Types**: the request/response envelopes exchanged over a connection
//! - **Codec**: encoding and decoding of envelopes to and from JSON frames
//! - **Error handling**: transport-level errors and the per-request dispatch
//!   error categories whose text becomes the client-visible `error` field
//! - **Observability**: tracing subscriber and OpenTelemetry setup
//!
//! # Wire envelope
//!
//! Every frame carries exactly one JSON object:
//!
//! ```text
//! Request:  { "id": <scalar>, "method": <string>, "params": <opaque> }
//! Response: { "id": <echoed>, "result": <opaque>, "error": <string> }
//! ```
//!
//! `result` is present only on success and `error` only on failure. A void
//! success carries neither.
//!
//! # Example
//!
//! ```rust
//! use wirecall_core::{codec, Id, Response};
//!
//! let request = codec::decode_request(r#"{"id":1,"method":"ping"}"#).unwrap();
//! assert_eq!(request.method, "ping");
//!
//! let response = Response::success(request.id, None);
//! assert_eq!(codec::encode_response(&response).unwrap(), r#"{"id":1}"#);
//! # let _ = Id::Null;
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

// Re-export the most commonly used types for convenience
pub use error::{DispatchError, Error, ParamsError, Result, INTERNAL_SERVER_ERROR};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{Id, Params, Request, Response};
