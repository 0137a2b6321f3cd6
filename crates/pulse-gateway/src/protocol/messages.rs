//! Gateway message format
//!
//! Defines the framed envelope every gateway message travels in.

use super::{
    HelloPayload, IdentifyPayload, OpCode, ReadyPayload, RequestGuildMembersPayload, ResumePayload,
    VoiceServerUpdatePayload, VoiceStatePayload,
};
use crate::presence::Presence;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway message format
///
/// All messages sent over the gateway connection follow this format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event data payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event type (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayMessage {
    /// Create a message with an opaque payload
    #[must_use]
    pub fn new(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    // === Client Messages ===

    /// Create a Heartbeat message (op=1)
    ///
    /// Carries the last seen sequence number, or no payload before the
    /// first sequenced frame.
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::new(
            OpCode::Heartbeat,
            last_sequence.map(|s| Value::Number(s.into())),
        )
    }

    /// Create an Identify message (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::new(OpCode::Identify, serde_json::to_value(payload).ok())
    }

    /// Create a Resume message (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::new(OpCode::Resume, serde_json::to_value(payload).ok())
    }

    /// Create a Presence Update message (op=3)
    #[must_use]
    pub fn presence_update(presence: &Presence) -> Self {
        Self::new(OpCode::PresenceUpdate, serde_json::to_value(presence).ok())
    }

    /// Create a Voice State Update message (op=4)
    #[must_use]
    pub fn voice_state_update(payload: &VoiceStatePayload) -> Self {
        Self::new(OpCode::VoiceStateUpdate, serde_json::to_value(payload).ok())
    }

    /// Create a Request Guild Members message (op=8)
    #[must_use]
    pub fn request_guild_members(payload: &RequestGuildMembersPayload) -> Self {
        Self::new(OpCode::RequestGuildMembers, serde_json::to_value(payload).ok())
    }

    // === Parsing Server Messages ===

    /// Try to parse as a Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Read the INVALID_SESSION resumable flag (op=9)
    ///
    /// The payload is a bare boolean; anything else reads as not resumable.
    #[must_use]
    pub fn invalid_session_resumable(&self) -> bool {
        self.op == OpCode::InvalidSession
            && self.d.as_ref().and_then(Value::as_bool).unwrap_or(false)
    }

    /// Try to parse a READY dispatch payload
    pub fn as_ready(&self) -> Option<ReadyPayload> {
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Try to parse a VOICE_STATE_UPDATE dispatch payload
    pub fn as_voice_state(&self) -> Option<VoiceStatePayload> {
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Try to parse a VOICE_SERVER_UPDATE dispatch payload
    pub fn as_voice_server(&self) -> Option<VoiceServerUpdatePayload> {
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    // === Utilities ===

    /// Check if this is a valid server message
    #[must_use]
    pub fn is_valid_server_message(&self) -> bool {
        self.op.is_server_op()
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
