//! Payload definitions
//!
//! Typed payloads for the frames the engine builds or inspects. Anything the
//! engine merely forwards stays an opaque `serde_json::Value`.

use crate::presence::Presence;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
///
/// Sent by the client to open a fresh session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Authentication token
    pub token: String,

    /// Client properties (process-wide constants)
    pub properties: IdentifyProperties,

    /// Whether payload compression is acceptable
    pub compress: bool,

    /// Member-list threshold above which offline members are omitted
    pub large_threshold: u16,

    /// Shard tuple `[shard_id, shard_count]`, present only when sharded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u16; 2]>,

    /// Whether to subscribe to guild member/presence events
    pub guild_subscriptions: bool,

    /// Initial presence, if configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
}

/// Client connection properties
///
/// Assembled once per process; see [`identify_properties`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    pub os: String,

    /// Client name
    pub browser: String,

    /// Device type
    pub device: String,

    /// Library version
    pub version: String,
}

/// Process-wide identify properties, computed on first use
pub fn identify_properties() -> &'static IdentifyProperties {
    static PROPERTIES: OnceLock<IdentifyProperties> = OnceLock::new();
    PROPERTIES.get_or_init(|| IdentifyProperties {
        os: std::env::consts::OS.to_string(),
        browser: "pulse-gateway".to_string(),
        device: "pulse-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to replay a dropped session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: u64,
}

/// READY dispatch payload (the fields the engine consumes)
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    /// Server-assigned session ID
    pub session_id: String,

    /// The authenticated principal
    pub user: ReadyUser,

    /// Gateway trace data
    #[serde(rename = "_trace", default)]
    pub trace: Vec<String>,
}

/// The `user` subrecord of READY
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyUser {
    pub id: String,
}

/// Payload for op 4 (Voice State Update), also received as a dispatch event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceStatePayload {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
}

impl VoiceStatePayload {
    /// The registry key: guild id when present, else channel id
    #[must_use]
    pub fn server_id(&self) -> Option<&str> {
        self.guild_id.as_deref().or(self.channel_id.as_deref())
    }
}

/// VOICE_SERVER_UPDATE dispatch payload
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceServerUpdatePayload {
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub endpoint: String,
    pub token: String,
}

impl VoiceServerUpdatePayload {
    /// The registry key: guild id when present, else channel id
    #[must_use]
    pub fn server_id(&self) -> Option<&str> {
        self.guild_id.as_deref().or(self.channel_id.as_deref())
    }
}

/// GUILD_DELETE dispatch payload
#[derive(Debug, Clone, Deserialize)]
pub struct GuildDeletePayload {
    pub id: String,

    /// Present and true when the guild became unavailable (outage) rather
    /// than the user leaving it.
    #[serde(default)]
    pub unavailable: bool,
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: String,

    /// Username prefix filter; empty string matches all members
    #[serde(default)]
    pub query: String,

    /// Maximum number of members to return (0 = no limit)
    #[serde(default)]
    pub limit: u32,
}

/// Payload for op 15 (Lobby Connect)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyConnectPayload {
    pub lobby_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lobby_secret: Option<String>,
}

/// Payload for the stream control ops (18–22)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamKeyPayload {
    pub stream_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_payload_field_name() {
        let hello: HelloPayload = serde_json::from_str(r#"{"heartbeat_interval":45000}"#).unwrap();
        assert_eq!(hello.heartbeat_interval, 45_000);
    }

    #[test]
    fn test_identify_properties_are_stable() {
        let a = identify_properties();
        let b = identify_properties();
        assert_eq!(a.os, b.os);
        assert_eq!(a.browser, "pulse-gateway");
        assert!(!a.version.is_empty());
    }

    #[test]
    fn test_identify_shard_omitted_when_none() {
        let payload = IdentifyPayload {
            token: "tok".to_string(),
            properties: identify_properties().clone(),
            compress: false,
            large_threshold: 250,
            shard: None,
            guild_subscriptions: true,
            presence: None,
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("shard"));
        assert!(json.contains("large_threshold"));
    }

    #[test]
    fn test_resume_payload_serialization() {
        let payload = ResumePayload {
            token: "tok".to_string(),
            session_id: "session456".to_string(),
            seq: 42,
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("session456"));
        assert!(json.contains("42"));
    }

    #[test]
    fn test_ready_payload_parsing() {
        let ready: ReadyPayload = serde_json::from_str(
            r#"{"session_id":"S1","user":{"id":"U1","username":"ping"},"_trace":["gw-07"]}"#,
        )
        .unwrap();

        assert_eq!(ready.session_id, "S1");
        assert_eq!(ready.user.id, "U1");
        assert_eq!(ready.trace, vec!["gw-07".to_string()]);
    }

    #[test]
    fn test_voice_state_server_id_prefers_guild() {
        let both = VoiceStatePayload {
            guild_id: Some("G".to_string()),
            channel_id: Some("C".to_string()),
            ..Default::default()
        };
        assert_eq!(both.server_id(), Some("G"));

        let channel_only = VoiceStatePayload {
            channel_id: Some("C".to_string()),
            ..Default::default()
        };
        assert_eq!(channel_only.server_id(), Some("C"));
    }

    #[test]
    fn test_guild_delete_unavailable_defaults_false() {
        let left: GuildDeletePayload = serde_json::from_str(r#"{"id":"G1"}"#).unwrap();
        assert!(!left.unavailable);

        let outage: GuildDeletePayload =
            serde_json::from_str(r#"{"id":"G1","unavailable":true}"#).unwrap();
        assert!(outage.unavailable);
    }
}
