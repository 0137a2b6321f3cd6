//! WebSocket transport
//!
//! `tokio-tungstenite` adapter behind the [`Transport`] trait. Ping/pong is
//! the socket's own liveness mechanism and is handled below this layer; the
//! protocol heartbeat never depends on it.

use super::{Connector, Transport, TransportError, TransportEvent, EVENT_BUFFER_SIZE};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<TcpStream>>,
    Message,
>;

/// Connector producing WebSocket transports
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn Transport>, mpsc::Receiver<TransportEvent>), TransportError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (sink, mut reader) = stream.split();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER_SIZE);

        // connect_async resolving is the open signal.
        let _ = events_tx.send(TransportEvent::Open).await;

        tokio::spawn(async move {
            let mut announced_close = false;

            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if events_tx
                            .send(TransportEvent::Message(text.into_bytes()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Ok(Message::Binary(data)) => {
                        if events_tx.send(TransportEvent::Message(data)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {}
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                            None => (None, String::new()),
                        };
                        announced_close = true;
                        let _ = events_tx.send(TransportEvent::Closed { code, reason }).await;
                        break;
                    }
                    Ok(Message::Frame(_)) => {}
                    Err(e) => {
                        let _ = events_tx.send(TransportEvent::Error(e.to_string())).await;
                        announced_close = true;
                        let _ = events_tx
                            .send(TransportEvent::Closed {
                                code: None,
                                reason: e.to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }

            if !announced_close {
                let _ = events_tx
                    .send(TransportEvent::Closed {
                        code: None,
                        reason: "connection reset".to_string(),
                    })
                    .await;
            }
        });

        let transport = WebSocketTransport {
            sink: Mutex::new(sink),
        };

        Ok((Box::new(transport), events_rx))
    }
}

/// A connected WebSocket
struct WebSocketTransport {
    sink: Mutex<WsSink>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, data: Vec<u8>, binary: bool) -> Result<(), TransportError> {
        let message = if binary {
            Message::Binary(data)
        } else {
            let text = String::from_utf8(data).map_err(|e| TransportError::Send(e.to_string()))?;
            Message::Text(text)
        };

        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: reason.to_string().into(),
        };

        let _ = self.sink.lock().await.send(Message::Close(Some(frame))).await;
    }
}
