//! Transport abstraction
//!
//! The engine drives a duplex byte channel through these traits and never
//! touches the socket directly. The production implementation is a
//! WebSocket ([`WebSocketConnector`]); tests substitute scripted
//! connectors. Events from one transport are delivered in order through a
//! single channel, which is what serializes all protocol callbacks.

mod websocket;

pub use websocket::WebSocketConnector;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffer size for the transport event channel
pub const EVENT_BUFFER_SIZE: usize = 100;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("transport closed")]
    Closed,
}

/// Events surfaced by a live transport, in delivery order
#[derive(Debug)]
pub enum TransportEvent {
    /// The connection is established and writable
    Open,
    /// A complete transport message arrived
    Message(Vec<u8>),
    /// A non-fatal transport error
    Error(String),
    /// The connection ended; terminal for this transport
    Closed { code: Option<u16>, reason: String },
}

/// A connected duplex byte channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit one message; `binary` selects the frame type
    async fn send(&self, data: Vec<u8>, binary: bool) -> Result<(), TransportError>;

    /// Close the connection with a code and reason
    async fn close(&self, code: u16, reason: &str);
}

/// Opens transports from URLs
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport; the receiver yields its events, starting with
    /// [`TransportEvent::Open`] and ending with [`TransportEvent::Closed`]
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn Transport>, mpsc::Receiver<TransportEvent>), TransportError>;
}
