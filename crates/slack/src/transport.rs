//! Full-duplex frame transport over the RTM websocket.
//!
//! The connection is split at open time into a [`FrameSource`] (owned by the
//! reader pump) and a [`FrameSink`] (shared by the writer pump and the
//! shutdown coordinator). Nothing else touches the socket.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Read(String),
    #[error("transport closed by peer")]
    Closed,
    #[error("transport write failed: {0}")]
    Write(String),
    #[error("transport close handshake failed: {0}")]
    Close(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// One inbound frame, already stripped of websocket framing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[async_trait]
pub trait FrameSource: Send {
    /// Blocks until the next data frame arrives. Peer close and socket errors
    /// are both terminal.
    async fn receive(&mut self) -> Result<Frame, TransportError>;
}

#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Sends a normal-closure (1000) close frame.
    async fn send_close(&self) -> Result<(), TransportError>;
}

#[async_trait]
impl<S> FrameSink for Arc<S>
where
    S: FrameSink + ?Sized,
{
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        (**self).send(frame).await
    }

    async fn send_close(&self) -> Result<(), TransportError> {
        (**self).send_close().await
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketSource {
    stream: SplitStream<WsStream>,
}

#[derive(Clone)]
pub struct WebSocketSink {
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
}

/// Performs the websocket handshake and splits the connection into its two halves.
pub async fn open(url: &str) -> Result<(WebSocketSource, WebSocketSink), TransportError> {
    info!(event_name = "system.transport.connecting", "opening rtm websocket");
    let (stream, response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|error| TransportError::Connect(error.to_string()))?;
    info!(
        event_name = "system.transport.connected",
        status = response.status().as_u16(),
        "rtm websocket handshake complete"
    );

    let (sink, stream) = stream.split();
    Ok((WebSocketSource { stream }, WebSocketSink { sink: Arc::new(Mutex::new(sink)) }))
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn receive(&mut self) -> Result<Frame, TransportError> {
        loop {
            let Some(message) = self.stream.next().await else {
                return Err(TransportError::Closed);
            };
            let message = message.map_err(|error| TransportError::Read(error.to_string()))?;

            match message {
                Message::Text(text) => return Ok(Frame::Text(text.to_string())),
                Message::Binary(data) => return Ok(Frame::Binary(data.to_vec())),
                Message::Close(frame) => {
                    debug!(
                        event_name = "ingress.rtm.close_received",
                        code = frame.as_ref().map(|frame| u16::from(frame.code)),
                        "peer sent close frame"
                    );
                    return Err(TransportError::Closed);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(frame.into()))
            .await
            .map_err(|error| TransportError::Write(error.to_string()))
    }

    async fn send_close(&self) -> Result<(), TransportError> {
        let close = CloseFrame { code: CloseCode::Normal, reason: "".into() };
        let mut sink = self.sink.lock().await;
        sink.send(Message::Close(Some(close)))
            .await
            .map_err(|error| TransportError::Close(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::WebSocketStream;

    use super::{open, Frame, FrameSink, FrameSource, TransportError};

    async fn local_peer() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let url = format!("ws://{}", listener.local_addr().expect("local addr"));
        (listener, url)
    }

    async fn accept(listener: TcpListener) -> WebSocketStream<tokio::net::TcpStream> {
        let (tcp, _) = listener.accept().await.expect("accept");
        tokio_tungstenite::accept_async(tcp).await.expect("server handshake")
    }

    #[tokio::test]
    async fn text_flows_both_ways_pings_are_skipped_and_close_is_normal() {
        let (listener, url) = local_peer().await;
        let peer = tokio::spawn(async move {
            let mut ws = accept(listener).await;
            ws.send(Message::Ping(vec![1, 2, 3].into())).await.expect("ping");
            ws.send(Message::Text(r#"{"type":"hello"}"#.into())).await.expect("text");

            let reply = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => break text.as_str().to_owned(),
                    Some(Ok(Message::Pong(_))) => continue,
                    other => panic!("expected a text frame, got {other:?}"),
                }
            };
            let close = loop {
                match ws.next().await {
                    Some(Ok(Message::Close(frame))) => break frame,
                    Some(Ok(_)) => continue,
                    other => panic!("expected a close frame, got {other:?}"),
                }
            };
            // Flushes our half of the closing handshake.
            while let Some(Ok(_)) = ws.next().await {}
            (reply, close)
        });

        let (mut source, sink) = open(&url).await.expect("client handshake");
        assert_eq!(source.receive().await, Ok(Frame::Text(r#"{"type":"hello"}"#.to_owned())));

        sink.send(r#"{"id":0,"type":"message","channel":"C1","text":"Hello!"}"#.to_owned())
            .await
            .expect("send text");
        sink.send_close().await.expect("send close");

        let (reply, close) = peer.await.expect("peer task");
        assert_eq!(reply, r#"{"id":0,"type":"message","channel":"C1","text":"Hello!"}"#);
        assert_eq!(close.map(|frame| frame.code), Some(CloseCode::Normal));
        assert_eq!(source.receive().await, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn peer_close_ends_the_source() {
        let (listener, url) = local_peer().await;
        let peer = tokio::spawn(async move {
            let mut ws = accept(listener).await;
            ws.close(None).await.expect("close");
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (mut source, sink) = open(&url).await.expect("client handshake");
        assert_eq!(source.receive().await, Err(TransportError::Closed));

        drop((source, sink));
        peer.await.expect("peer task");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_connect_error() {
        let (listener, url) = local_peer().await;
        drop(listener);

        let result = open(&url).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
