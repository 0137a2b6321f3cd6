//! Session bookkeeping
//!
//! Tracks the (session id, sequence, user id) triple that identifies a
//! resumable session, and enforces the sequence ordering rules.

use crate::protocol::ReadyPayload;

/// Result of observing an inbound sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SequenceOutcome {
    /// The counter is up to date
    Tracked,
    /// The sequence jumped past the next expected value; events were lost
    /// and the session must be resumed
    Gap,
}

/// Mutable session identity
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// Last seen inbound sequence number; 0 until the first sequenced frame
    pub sequence: u64,

    /// Server-assigned session id, set by READY
    pub session_id: Option<String>,

    /// Authenticated principal, set by READY
    pub user_id: Option<String>,

    /// Gateway trace data from READY
    pub trace: Vec<String>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Observe an inbound sequence number
    ///
    /// A jump past `sequence + 1` while not resuming means dropped events:
    /// the counter is left untouched (it is the resume point) and `Gap` is
    /// returned. The counter never decreases.
    pub(crate) fn observe_sequence(&mut self, s_new: u64, resuming: bool) -> SequenceOutcome {
        if !resuming && s_new > self.sequence + 1 {
            return SequenceOutcome::Gap;
        }

        if s_new > self.sequence {
            self.sequence = s_new;
        }

        SequenceOutcome::Tracked
    }

    /// The sequence for heartbeat payloads: none before the first
    /// sequenced frame
    #[must_use]
    pub(crate) fn last_sequence(&self) -> Option<u64> {
        (self.sequence > 0).then_some(self.sequence)
    }

    /// Apply a READY dispatch
    pub(crate) fn apply_ready(&mut self, ready: &ReadyPayload) {
        self.session_id = Some(ready.session_id.clone());
        self.user_id = Some(ready.user.id.clone());
        self.trace = ready.trace.clone();
    }

    /// Whether the stored session can be resumed on the next open
    #[must_use]
    pub(crate) fn can_resume(&self) -> bool {
        self.session_id.is_some()
    }

    /// Wipe resumable state; the next open re-identifies
    pub(crate) fn wipe(&mut self) {
        self.sequence = 0;
        self.session_id = None;
    }
}
