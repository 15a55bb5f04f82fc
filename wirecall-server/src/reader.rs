//! Request stream over a connection's read half
//!
//! Requests are pulled one at a time with no read-ahead buffering, so a slow
//! consumer stalls reading. The first decode or transport failure is logged
//! and ends the stream for good; the reader never tries to resynchronize.

use crate::transport::FrameReader;
use futures::stream::{self, Stream};
use wirecall_core::Request;

/// Why a connection stopped producing requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEnd {
    /// The peer closed the stream
    Eof,
    /// A frame failed to read or decode; carries the error text
    Failed(String),
    /// Reading was stopped through the connection's cancellation token
    Cancelled,
}

impl ReadEnd {
    pub fn is_clean(&self) -> bool {
        !matches!(self, ReadEnd::Failed(_))
    }
}

/// Pulls decoded requests from a [`FrameReader`] until it is exhausted
pub struct RequestReader<R> {
    inner: R,
    conn_id: u64,
    end: Option<ReadEnd>,
}

impl<R: FrameReader> RequestReader<R> {
    pub fn new(inner: R, conn_id: u64) -> Self {
        Self {
            inner,
            conn_id,
            end: None,
        }
    }

    /// Next request, or `None` once the stream has ended
    ///
    /// After the first `None` every later call returns `None` without
    /// touching the underlying reader.
    pub async fn next(&mut self) -> Option<Request> {
        if self.end.is_some() {
            return None;
        }

        match self.inner.read_one().await {
            Ok(Some(request)) => Some(request),
            Ok(None) => {
                tracing::debug!(conn_id = self.conn_id, "Peer closed the request stream");
                self.end = Some(ReadEnd::Eof);
                None
            }
            Err(e) => {
                tracing::error!(conn_id = self.conn_id, error = %e, "Failed to read request, closing request stream");
                self.end = Some(ReadEnd::Failed(e.to_string()));
                None
            }
        }
    }

    /// Stop reading; later calls to `next` return `None`
    pub fn mark_cancelled(&mut self) {
        if self.end.is_none() {
            self.end = Some(ReadEnd::Cancelled);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }

    /// How the stream ended; `Eof` if it was dropped while still open
    pub fn finish(self) -> ReadEnd {
        self.end.unwrap_or(ReadEnd::Eof)
    }

    /// Adapt into a `Stream` of requests
    pub fn into_stream(self) -> impl Stream<Item = Request> + Send {
        stream::unfold(self, |mut reader| async move {
            let request = reader.next().await?;
            Some((request, reader))
        })
    }
}
