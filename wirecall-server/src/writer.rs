//! Response writer task
//!
//! Drains the connection's sink in completion order and writes each response
//! to the connection. A failed write costs that one response and nothing
//! more. Once every sender of the sink has been dropped the writer closes the
//! connection and reports what it did.

use crate::transport::FrameWriter;
use tokio::sync::mpsc;
use wirecall_core::Response;

/// What the writer did over the lifetime of a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSummary {
    pub written: u64,
    pub failed: u64,
}

/// Write responses until the sink closes, then close the connection
pub async fn write_responses<W: FrameWriter>(
    mut writer: W,
    mut sink: mpsc::Receiver<Response>,
    conn_id: u64,
) -> WriterSummary {
    let mut summary = WriterSummary::default();

    while let Some(response) = sink.recv().await {
        match writer.write_one(&response).await {
            Ok(()) => {
                summary.written += 1;
                tracing::debug!(conn_id, id = %response.id, error = ?response.error, "Response written");
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(conn_id, id = %response.id, error = %e, "Failed to write response");
            }
        }
    }

    if let Err(e) = writer.close().await {
        tracing::error!(conn_id, error = %e, "Failed to close connection");
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use wirecall_core::{Error, Id, Result};

    /// Records writes; fails any response whose id is the string "bad"
    #[derive(Clone, Default)]
    struct RecordingWriter {
        written: Arc<Mutex<Vec<Id>>>,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl FrameWriter for RecordingWriter {
        async fn write_one(&mut self, response: &Response) -> Result<()> {
            if response.id == Id::String("bad".into()) {
                return Err(Error::Io("broken pipe".into()));
            }
            self.written.lock().unwrap().push(response.id.clone());
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            *self.closed.lock().unwrap() = true;
            Err(Error::ConnectionClosed)
        }
    }

    #[tokio::test]
    async fn test_write_failure_does_not_halt() {
        let writer = RecordingWriter::default();
        let (tx, rx) = mpsc::channel(8);

        tx.send(Response::success(Id::Number(1), None)).await.unwrap();
        tx.send(Response::success(Id::String("bad".into()), None)).await.unwrap();
        tx.send(Response::success(Id::Number(3), None)).await.unwrap();
        drop(tx);

        let summary = write_responses(writer.clone(), rx, 1).await;

        assert_eq!(summary, WriterSummary { written: 2, failed: 1 });
        assert_eq!(*writer.written.lock().unwrap(), vec![Id::Number(1), Id::Number(3)]);
        // A close failure is logged, not propagated
        assert!(*writer.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_closes_when_all_senders_drop() {
        let writer = RecordingWriter::default();
        let (tx, rx) = mpsc::channel(1);
        let tx2 = tx.clone();

        let task = tokio::spawn(write_responses(writer.clone(), rx, 1));
        tx.send(Response::success(Id::Number(1), None)).await.unwrap();
        drop(tx);
        tx2.send(Response::success(Id::Number(2), None)).await.unwrap();
        drop(tx2);

        let summary = task.await.unwrap();
        assert_eq!(summary.written, 2);
        assert!(*writer.closed.lock().unwrap());
    }
}
