//! Media session contract
//!
//! The narrow interface the engine consumes from the voice/video engine.
//! Everything else about a media session is opaque.

use std::sync::Arc;

/// A secondary per-server voice/video session driven by the engine
///
/// Implementations are owned by the engine's registry; `kill` is terminal
/// and is called exactly once, on removal.
pub trait MediaSession: Send + Sync {
    /// The registry key this session is filed under
    fn server_id(&self) -> &str;

    /// The session's current voice session id, once known
    fn session_id(&self) -> Option<String>;

    /// The session's current channel id, once known
    fn channel_id(&self) -> Option<String>;

    /// Push a new channel id from a voice state update
    fn set_channel_id(&self, channel_id: Option<String>);

    /// Push the media endpoint from a voice server update
    fn set_endpoint(&self, endpoint: String);

    /// Push the media token from a voice server update
    fn set_token(&self, token: String);

    /// Terminate the session; `reason` is present for abnormal ends
    fn kill(&self, reason: Option<&str>);
}

/// Creates media sessions for voice connect
pub trait MediaSessionFactory: Send + Sync {
    /// Create a session for `server_id` targeting `channel_id`
    fn create(&self, server_id: &str, channel_id: &str) -> Arc<dyn MediaSession>;
}
