//! Client-side gateway protocol engine
//!
//! Maintains the persistent full-duplex session a client holds against a
//! chat/voice gateway: encoding and compression negotiation, identify and
//! resume, heartbeat liveness, outbound pacing, reconnection, and
//! coordination of per-server media sessions.
//!
//! ```no_run
//! use pulse_gateway::{GatewayClient, GatewayEvent, GatewayOptions};
//!
//! # async fn run() -> Result<(), pulse_gateway::GatewayError> {
//! let options = GatewayOptions::new(std::env::var("PULSE_TOKEN").unwrap());
//! let (client, mut events) = GatewayClient::new(options)?;
//! client.connect(Some("wss://gateway.example.com")).await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let GatewayEvent::Dispatch { name, .. } = event {
//!         println!("{name}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod events;
pub mod options;
pub mod presence;
pub mod protocol;
pub mod ratelimit;
pub mod transport;
pub mod voice;

mod handlers;

pub use codec::{Codec, Encoding, StreamDecompressor};
pub use connection::{ConnectionState, GatewayClient};
pub use error::GatewayError;
pub use events::GatewayEvent;
pub use options::{Compression, ConfigError, GatewayOptions};
pub use presence::{Activity, Presence, PresencePatch, PresenceStatus};
pub use protocol::{CloseCode, GatewayMessage, OpCode};
pub use transport::{Connector, Transport, TransportEvent};
pub use voice::{MediaSession, MediaSessionFactory};
