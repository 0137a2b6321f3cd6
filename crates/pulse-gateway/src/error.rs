//! Engine error types

use crate::options::ConfigError;
use thiserror::Error;

/// Errors surfaced by user-facing engine methods
///
/// Callback paths never raise; they degrade to warn notifications. These
/// errors come only out of the constructor and the public API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid construction-time configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `connect` was called with no URL and none stored from a prior call
    #[error("no gateway URL to connect to")]
    MissingUrl,

    /// The gateway URL could not be parsed
    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),

    /// Voice connect needs at least one of guild id or channel id
    #[error("either a guild id or a channel id is required")]
    MissingVoiceTarget,

    /// Voice connect requires a media session factory in the options
    #[error("no media session factory configured")]
    MediaUnavailable,

    /// The voice connect deadline elapsed before the session settled
    #[error("voice connect timed out")]
    VoiceTimeout,

    /// The media session ended before the voice connect settled
    #[error("voice connect aborted: {0}")]
    VoiceAborted(String),
}
