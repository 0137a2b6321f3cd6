//! Engine options
//!
//! Construction-time configuration for a gateway client. Everything is
//! validated up front; a misconfigured engine never starts.

use crate::codec::Encoding;
use crate::presence::PresencePatch;
use crate::voice::MediaSessionFactory;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transport compression mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No transport compression
    None,
    /// Shared zlib context across the connection, frames delimited by a
    /// sync-flush trailer
    ZlibStream,
}

impl Compression {
    /// The value for the gateway URL's `compress` query parameter, when any
    #[must_use]
    pub const fn wire_name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::ZlibStream => Some("zlib-stream"),
        }
    }

    /// Whether transport compression is enabled
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::ZlibStream)
    }
}

/// Configuration errors
///
/// Raised at construction; the engine never starts misconfigured.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("shard_id {id} must be less than shard_count {count}")]
    InvalidShard { id: u16, count: u16 },

    #[error("encoding '{0}' is not available in this build")]
    EncodingUnavailable(&'static str),
}

/// Options for a gateway client
#[derive(Clone)]
pub struct GatewayOptions {
    /// Authentication token presented in IDENTIFY/RESUME
    pub token: String,

    /// Reconnect automatically after a close (subject to the retry budget)
    pub auto_reconnect: bool,

    /// Transport compression mode
    pub compress: Compression,

    /// Frame encoding
    pub encoding: Encoding,

    /// Subscribe to guild member/presence events in IDENTIFY
    pub guild_subscriptions: bool,

    /// Member-list threshold included in IDENTIFY
    pub large_threshold: u16,

    /// Default presence layered under every presence update
    pub presence: Option<PresencePatch>,

    /// Delay between a close and the next reconnect attempt
    pub reconnect_delay: Duration,

    /// Reconnect attempts before the engine is killed
    pub reconnect_max: u32,

    /// This engine's shard
    pub shard_id: u16,

    /// Total shard count
    pub shard_count: u16,

    /// Dispatch event names suppressed from external emission
    pub disabled_events: HashSet<String>,

    /// Deadline for voice connect promises
    pub voice_timeout: Duration,

    /// Factory for media sessions; voice connect is unavailable without it
    pub media: Option<Arc<dyn MediaSessionFactory>>,
}

impl GatewayOptions {
    /// Create options with the protocol defaults
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            auto_reconnect: true,
            compress: Compression::ZlibStream,
            encoding: Encoding::preferred(),
            guild_subscriptions: true,
            large_threshold: 250,
            presence: None,
            reconnect_delay: Duration::from_millis(5_000),
            reconnect_max: 5,
            shard_id: 0,
            shard_count: 1,
            disabled_events: HashSet::new(),
            voice_timeout: Duration::from_millis(30_000),
            media: None,
        }
    }

    /// Set the frame encoding
    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the transport compression mode
    #[must_use]
    pub fn with_compression(mut self, compress: Compression) -> Self {
        self.compress = compress;
        self
    }

    /// Set the shard tuple
    #[must_use]
    pub fn with_shard(mut self, shard_id: u16, shard_count: u16) -> Self {
        self.shard_id = shard_id;
        self.shard_count = shard_count;
        self
    }

    /// Set the default presence
    #[must_use]
    pub fn with_presence(mut self, presence: PresencePatch) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Set the reconnect budget
    #[must_use]
    pub fn with_reconnect(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.reconnect_delay = delay;
        self.reconnect_max = max_attempts;
        self
    }

    /// Suppress a dispatch event from external emission
    #[must_use]
    pub fn with_disabled_event(mut self, name: impl Into<String>) -> Self {
        self.disabled_events.insert(name.into());
        self
    }

    /// Set the media session factory used by voice connect
    #[must_use]
    pub fn with_media_factory(mut self, factory: Arc<dyn MediaSessionFactory>) -> Self {
        self.media = Some(factory);
        self
    }

    /// Validate the options
    ///
    /// # Errors
    /// Returns a `ConfigError` for an out-of-range shard or an encoding not
    /// compiled into this build.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_id >= self.shard_count {
            return Err(ConfigError::InvalidShard {
                id: self.shard_id,
                count: self.shard_count,
            });
        }

        if !self.encoding.is_available() {
            return Err(ConfigError::EncodingUnavailable(self.encoding.wire_name()));
        }

        Ok(())
    }

    /// The shard tuple for IDENTIFY, present only when actually sharded
    #[must_use]
    pub fn identify_shard(&self) -> Option<[u16; 2]> {
        (self.shard_count > 1).then_some([self.shard_id, self.shard_count])
    }
}

impl std::fmt::Debug for GatewayOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayOptions")
            .field("auto_reconnect", &self.auto_reconnect)
            .field("compress", &self.compress)
            .field("encoding", &self.encoding)
            .field("shard", &(self.shard_id, self.shard_count))
            .field("reconnect_max", &self.reconnect_max)
            .finish_non_exhaustive()
    }
}
