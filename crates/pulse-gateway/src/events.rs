//! Notifications emitted to the application
//!
//! The engine's only output surface: a bounded channel of typed events.
//! Dispatch payloads are forwarded verbatim; the engine does not interpret
//! them beyond protocol control fields.

use serde_json::Value;

/// Buffer size for the notification channel
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// Notifications delivered to the application
#[derive(Debug)]
pub enum GatewayEvent {
    /// A fresh session is live
    Ready {
        session_id: String,
        user_id: String,
    },

    /// A dropped session was replayed successfully
    Resumed,

    /// A dispatch event not consumed by the engine
    Dispatch {
        name: String,
        sequence: Option<u64>,
        payload: Value,
    },

    /// The transport closed
    Close { code: Option<u16>, reason: String },

    /// A non-fatal protocol or wire problem
    Warn { message: String },

    /// The engine is terminal; no further events will arrive
    Killed,
}

impl GatewayEvent {
    /// The dispatch event name, for dispatch notifications
    #[must_use]
    pub fn dispatch_name(&self) -> Option<&str> {
        match self {
            Self::Dispatch { name, .. } => Some(name),
            _ => None,
        }
    }
}
