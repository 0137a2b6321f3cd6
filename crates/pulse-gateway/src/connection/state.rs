//! Connection state

use serde::{Deserialize, Serialize};

/// Lifecycle state of a gateway client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Created; no transport yet
    Initializing,
    /// Transport opening or open, HELLO not yet received
    Connecting,
    /// HELLO received, session not yet live
    Open,
    /// READY received on a fresh session
    Identified,
    /// RESUMED received on a replayed session
    Resumed,
    /// Disconnected, a reconnect is scheduled
    Reconnecting,
    /// Killed or out of retries; terminal
    Dead,
}

impl ConnectionState {
    /// Whether the session is live (READY or RESUMED seen)
    #[must_use]
    pub const fn is_session_live(self) -> bool {
        matches!(self, Self::Identified | Self::Resumed)
    }

    /// Whether the engine can still do I/O
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Dead)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Identified => "identified",
            Self::Resumed => "resumed",
            Self::Reconnecting => "reconnecting",
            Self::Dead => "dead",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_live_states() {
        assert!(ConnectionState::Identified.is_session_live());
        assert!(ConnectionState::Resumed.is_session_live());
        assert!(!ConnectionState::Open.is_session_live());
        assert!(!ConnectionState::Reconnecting.is_session_live());
    }

    #[test]
    fn test_terminal() {
        assert!(ConnectionState::Dead.is_terminal());
        assert!(!ConnectionState::Initializing.is_terminal());
    }
}
