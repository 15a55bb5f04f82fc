//! WebSocket transport
//!
//! Each text frame carries one request envelope; binary frames are accepted
//! as UTF-8 JSON. Ping and pong frames are skipped (tungstenite answers pings
//! on its own). A close frame or the end of the stream is treated as a clean
//! end of input, not an error.

use super::{FrameReader, FrameWriter, Transport};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_async, WebSocketStream};
use wirecall_core::{codec, Error, Request, Response, Result};

/// A WebSocket connection carrying wirecall envelopes
pub struct WebSocketTransport<S> {
    stream: WebSocketStream<S>,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an already upgraded WebSocket stream
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }

    /// Perform the server side of the WebSocket handshake on a raw stream
    pub async fn accept(stream: S) -> Result<Self> {
        let ws = accept_async(stream)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        Ok(Self::new(ws))
    }
}

impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Reader = WebSocketReader<S>;
    type Writer = WebSocketWriter<S>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = self.stream.split();
        (WebSocketReader { stream }, WebSocketWriter { sink })
    }
}

pub struct WebSocketReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> FrameReader for WebSocketReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_one(&mut self) -> Result<Option<Request>> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Ok(Message::Text(text))) => return codec::decode_request(&text).map(Some),
                Some(Ok(Message::Binary(data))) => {
                    return codec::decode_request_slice(&data).map(Some)
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "Close frame received");
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(None),
                Some(Err(e)) => return Err(Error::WebSocket(e.to_string())),
            }
        }
    }
}

pub struct WebSocketWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> FrameWriter for WebSocketWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_one(&mut self, response: &Response) -> Result<()> {
        let text = codec::encode_response(response)?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(Error::WebSocket(e.to_string())),
        }
    }
}
