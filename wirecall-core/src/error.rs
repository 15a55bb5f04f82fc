//! Error types for wirecall
//!
//! Two families of errors live here:
//!
//! - **Error**: connection-level failures (transport, codec, configuration).
//!   These never reach the client; they are logged and end a read loop, fail
//!   a single write, or abort server startup.
//! - **DispatchError**: the per-request failure categories. Each variant's
//!   `Display` text is exactly what ends up in the response's `error` field.
//!
//! # Examples
//!
//! ```rust
//! use wirecall_core::DispatchError;
//!
//! let err = DispatchError::MethodNotFound("bogus".into());
//! assert_eq!(err.to_string(), "method not found: bogus");
//! ```

use thiserror::Error;

/// Result type for wirecall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Client-visible text for a caught internal fault when diagnostics are hidden
pub const INTERNAL_SERVER_ERROR: &str = "internal server error";

/// Connection-level error type
///
/// # Error Categories
///
/// - **Transport errors**: Io, WebSocket, ConnectionClosed
/// - **Codec errors**: Decode, Serialization
/// - **Setup errors**: Config
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A frame could not be decoded into a request envelope
    ///
    /// The reader stops at the first decode failure; there is no attempt to
    /// resynchronize on the next frame.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A value could not be serialized to JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Input/output error from the underlying stream
    #[error("IO error: {0}")]
    Io(String),

    /// The peer or the local side has already closed the connection
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid server or connection configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Failure to parse a request's params into a handler's declared type
///
/// The message is the underlying serde error text, carried verbatim into the
/// response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParamsError {
    message: String,
}

impl ParamsError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for ParamsError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Per-request failure categories
///
/// Every category yields exactly one error response and leaves the
/// connection open. The `Display` output is the wire `error` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No handler is registered under the requested method name
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Params did not parse into the method's declared schema
    #[error("{0}")]
    InvalidParams(String),

    /// The handler itself returned a failure
    #[error("{0}")]
    Handler(String),

    /// An uncaught fault inside the dispatch unit
    #[error("{0}")]
    Internal(String),
}

impl DispatchError {
    /// Build an internal-fault error from the fault's diagnostic text
    ///
    /// With `expose` set the raw diagnostic becomes the client-visible text;
    /// otherwise the generic [`INTERNAL_SERVER_ERROR`] is used.
    pub fn internal(detail: impl Into<String>, expose: bool) -> Self {
        if expose {
            DispatchError::Internal(detail.into())
        } else {
            DispatchError::Internal(INTERNAL_SERVER_ERROR.to_string())
        }
    }

    /// Short label for the category, used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::MethodNotFound(_) => "method_not_found",
            DispatchError::InvalidParams(_) => "invalid_params",
            DispatchError::Handler(_) => "handler",
            DispatchError::Internal(_) => "internal",
        }
    }
}

impl From<ParamsError> for DispatchError {
    fn from(err: ParamsError) -> Self {
        DispatchError::InvalidParams(err.message)
    }
}
