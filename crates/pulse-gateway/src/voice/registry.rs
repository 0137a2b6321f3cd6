//! Media session registry
//!
//! Maps `server_id` to its media session. Each entry is exclusively owned
//! here: removal kills the session. The registry also holds the engine's
//! end of every pending voice-connect promise; the protocol driver resolves
//! them when the matching voice state arrives.

use super::MediaSession;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

struct VoiceEntry {
    session: Arc<dyn MediaSession>,
    waiters: Vec<oneshot::Sender<Arc<dyn MediaSession>>>,
}

/// Registry of live media sessions, keyed by server id
pub(crate) struct VoiceRegistry {
    entries: DashMap<String, VoiceEntry>,
}

impl VoiceRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Look up the session for a server
    pub(crate) fn get(&self, server_id: &str) -> Option<Arc<dyn MediaSession>> {
        self.entries.get(server_id).map(|e| Arc::clone(&e.session))
    }

    /// Whether a session exists for a server
    pub(crate) fn contains(&self, server_id: &str) -> bool {
        self.entries.contains_key(server_id)
    }

    /// Register a session; replaces (without killing) any stale entry
    pub(crate) fn insert(&self, server_id: &str, session: Arc<dyn MediaSession>) {
        self.entries.insert(
            server_id.to_string(),
            VoiceEntry {
                session,
                waiters: Vec::new(),
            },
        );
    }

    /// Add a voice-connect waiter for a registered server
    ///
    /// The receiver fires when the protocol driver sees the matching voice
    /// state update; it errors if the session is killed first.
    pub(crate) fn register_waiter(
        &self,
        server_id: &str,
    ) -> Option<oneshot::Receiver<Arc<dyn MediaSession>>> {
        let (tx, rx) = oneshot::channel();
        let mut entry = self.entries.get_mut(server_id)?;
        entry.waiters.push(tx);
        Some(rx)
    }

    /// Fulfil all pending waiters for a server
    pub(crate) fn resolve(&self, server_id: &str) {
        if let Some(mut entry) = self.entries.get_mut(server_id) {
            let session = Arc::clone(&entry.session);
            for waiter in entry.waiters.drain(..) {
                let _ = waiter.send(Arc::clone(&session));
            }
        }
    }

    /// Remove and kill the session for a server
    ///
    /// Dropping the entry rejects any pending waiters. Returns whether an
    /// entry existed.
    pub(crate) fn kill(&self, server_id: &str, reason: Option<&str>) -> bool {
        match self.entries.remove(server_id) {
            Some((_, entry)) => {
                tracing::debug!(server_id = %server_id, reason = ?reason, "Killing media session");
                entry.session.kill(reason);
                true
            }
            None => false,
        }
    }

    /// Remove and kill every registered session
    pub(crate) fn kill_all(&self, reason: Option<&str>) {
        let server_ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for server_id in server_ids {
            self.kill(&server_id, reason);
        }
    }

    /// Number of registered sessions
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for VoiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceRegistry")
            .field("sessions", &self.entries.len())
            .finish()
    }
}
