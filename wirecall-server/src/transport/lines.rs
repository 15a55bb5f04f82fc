//! Newline-delimited JSON transport
//!
//! One envelope per `\n`-terminated line. Blank lines are skipped and a
//! trailing `\r` is tolerated. Works over any async byte stream: stdio for
//! subprocess servers, a TCP socket, or an in-memory duplex in tests.

use super::{FrameReader, FrameWriter, Transport};
use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, ReadHalf, Stdin,
    Stdout, WriteHalf,
};
use wirecall_core::{codec, Request, Response, Result};

/// A JSON-lines connection over separate read and write streams
pub struct LinesTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> LinesTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<S> LinesTransport<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Use a single bidirectional stream (socket, duplex) for both halves
    pub fn from_stream(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self { reader, writer }
    }
}

impl LinesTransport<Stdin, Stdout> {
    /// Serve over the process's stdin and stdout
    pub fn stdio() -> Self {
        Self {
            reader: tokio::io::stdin(),
            writer: tokio::io::stdout(),
        }
    }
}

impl<R, W> Transport for LinesTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Reader = LinesReader<R>;
    type Writer = LinesWriter<W>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            LinesReader {
                lines: BufReader::new(self.reader).lines(),
            },
            LinesWriter {
                writer: self.writer,
            },
        )
    }
}

pub struct LinesReader<R> {
    lines: Lines<BufReader<R>>,
}

#[async_trait]
impl<R> FrameReader for LinesReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read_one(&mut self) -> Result<Option<Request>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            return codec::decode_request(line).map(Some);
        }
        Ok(None)
    }
}

pub struct LinesWriter<W> {
    writer: W,
}

#[async_trait]
impl<W> FrameWriter for LinesWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_one(&mut self, response: &Response) -> Result<()> {
        let mut text = codec::encode_response(response)?;
        text.push('\n');
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use wirecall_core::{Error, Id};

    #[tokio::test]
    async fn test_reads_lines_and_skips_blanks() {
        let input: &[u8] = b"{\"id\":1,\"method\":\"ping\"}\n\n   \n{\"id\":2,\"method\":\"ping\"}\r\n";
        let (mut reader, _writer) = LinesTransport::new(input, tokio::io::sink()).split();

        assert_eq!(reader.read_one().await.unwrap().unwrap().id, Id::Number(1));
        assert_eq!(reader.read_one().await.unwrap().unwrap().id, Id::Number(2));
        assert!(reader.read_one().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_line_without_newline() {
        let input: &[u8] = b"{\"id\":\"x\",\"method\":\"ping\"}";
        let (mut reader, _writer) = LinesTransport::new(input, tokio::io::sink()).split();

        assert_eq!(
            reader.read_one().await.unwrap().unwrap().id,
            Id::String("x".into())
        );
        assert!(reader.read_one().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_is_decode_error() {
        let input: &[u8] = b"{\"id\":1,\n";
        let (mut reader, _writer) = LinesTransport::new(input, tokio::io::sink()).split();
        assert!(matches!(reader.read_one().await, Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_writes_one_line_per_response() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let (_reader, mut writer) = LinesTransport::from_stream(local).split();

        writer
            .write_one(&Response::success(Id::Number(1), None))
            .await
            .unwrap();
        writer
            .write_one(&Response::success(Id::Number(3), Some(serde_json::json!("hi"))))
            .await
            .unwrap();
        writer.close().await.unwrap();

        let mut out = String::new();
        remote.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "{\"id\":1}\n{\"id\":3,\"result\":\"hi\"}\n");
    }
}
