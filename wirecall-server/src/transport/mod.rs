//! Connection transports
//!
//! The engine talks to a connection through two halves: a [`FrameReader`]
//! that yields decoded requests and a [`FrameWriter`] that serializes
//! responses. A [`Transport`] is anything that can be split into the two, so
//! the read loop and the writer task can own their halves independently.
//!
//! Two transports ship with the crate:
//!
//! - [`WebSocketTransport`]: one envelope per text (or UTF-8 binary) frame
//! - [`LinesTransport`]: one envelope per `\n`-terminated line, over any
//!   `AsyncRead`/`AsyncWrite` pair (pipes, stdio, TCP, in-memory duplex)

mod lines;
mod websocket;

pub use lines::{LinesReader, LinesTransport, LinesWriter};
pub use websocket::{WebSocketReader, WebSocketTransport, WebSocketWriter};

use async_trait::async_trait;
use wirecall_core::{Request, Response, Result};

/// Read half of a connection
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Read and decode the next request
    ///
    /// `Ok(None)` means the peer closed the stream. An `Err` is terminal:
    /// callers stop reading after the first failure.
    async fn read_one(&mut self) -> Result<Option<Request>>;
}

/// Write half of a connection
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Serialize and send one response
    async fn write_one(&mut self, response: &Response) -> Result<()>;

    /// Flush and close the connection
    async fn close(&mut self) -> Result<()>;
}

/// A connection that can be split into independent halves
pub trait Transport: Send + 'static {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}
