//! Outbound rate limiting
//!
//! A token bucket with a FIFO overflow queue. Submitted work is consumed by
//! a single worker via [`RateBucket::next_ready`], which preserves enqueue
//! order and blocks while the bucket is locked or out of tokens. The engine
//! locks the bucket from disconnect until the session is live again so
//! nothing is wasted on an unusable transport.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Default token capacity per window
pub const DEFAULT_SEND_LIMIT: u32 = 120;

/// Default replenish window
pub const DEFAULT_SEND_WINDOW: Duration = Duration::from_millis(60_000);

/// Token bucket with lock/unlock semantics and an ordered deferral queue
pub struct RateBucket<T> {
    capacity: u32,
    window: Duration,
    state: Mutex<BucketState<T>>,
    notify: Notify,
}

struct BucketState<T> {
    tokens: u32,
    window_started: Instant,
    locked: bool,
    queue: VecDeque<T>,
}

impl<T> RateBucket<T> {
    /// Create a bucket replenishing `capacity` tokens every `window`
    #[must_use]
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            state: Mutex::new(BucketState {
                tokens: capacity,
                window_started: Instant::now(),
                locked: false,
                queue: VecDeque::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Create a bucket with the gateway's default send limits
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SEND_LIMIT, DEFAULT_SEND_WINDOW)
    }

    /// Enqueue work; the consumer runs it as tokens and the lock allow
    pub fn submit(&self, item: T) {
        self.state.lock().expect("bucket state poisoned").queue.push_back(item);
        self.notify.notify_one();
    }

    /// Put work back at the head of the queue and lock the bucket
    ///
    /// Used when the consumer discovers the transport is unusable after
    /// dequeueing: ordering is preserved and the bucket stays quiet until
    /// unlocked.
    pub fn requeue_front(&self, item: T) {
        let mut state = self.state.lock().expect("bucket state poisoned");
        state.queue.push_front(item);
        state.locked = true;
    }

    /// Force all submitted work to queue regardless of token count
    pub fn lock(&self) {
        self.state.lock().expect("bucket state poisoned").locked = true;
    }

    /// Resume draining queued work, subject to token availability
    pub fn unlock(&self) {
        self.state.lock().expect("bucket state poisoned").locked = false;
        self.notify.notify_one();
    }

    /// Discard all queued work, returning how much was dropped
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock().expect("bucket state poisoned");
        let dropped = state.queue.len();
        state.queue.clear();
        dropped
    }

    /// Whether the bucket is currently locked
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.lock().expect("bucket state poisoned").locked
    }

    /// Number of queued work items
    #[must_use]
    pub fn queued(&self) -> usize {
        self.state.lock().expect("bucket state poisoned").queue.len()
    }

    /// Wait for the next work item that is allowed to run
    ///
    /// Returns items in submission order, consuming one token each. Pends
    /// while the bucket is locked, the queue is empty, or the window is
    /// exhausted. Intended for a single consumer.
    pub async fn next_ready(&self) -> T {
        loop {
            let wait = {
                let mut state = self.state.lock().expect("bucket state poisoned");

                if state.window_started.elapsed() >= self.window {
                    state.tokens = self.capacity;
                    state.window_started = Instant::now();
                }

                if state.locked || state.queue.is_empty() {
                    None
                } else if state.tokens > 0 {
                    state.tokens -= 1;
                    return state.queue.pop_front().expect("queue checked non-empty");
                } else {
                    Some(self.window.saturating_sub(state.window_started.elapsed()))
                }
            };

            match wait {
                Some(until_refill) => {
                    tokio::select! {
                        () = tokio::time::sleep(until_refill) => {}
                        () = self.notify.notified() => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }
}

impl<T> std::fmt::Debug for RateBucket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("bucket state poisoned");
        f.debug_struct("RateBucket")
            .field("capacity", &self.capacity)
            .field("tokens", &state.tokens)
            .field("locked", &state.locked)
            .field("queued", &state.queue.len())
            .finish()
    }
}
