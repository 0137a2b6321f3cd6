//! Invalid Session handler (op 9)

use crate::connection::GatewayInner;
use crate::protocol::GatewayMessage;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Lower bound of the retry jitter, milliseconds
const RETRY_JITTER_MIN_MS: u64 = 1_000;

/// Upper bound of the retry jitter, milliseconds (inclusive)
const RETRY_JITTER_MAX_MS: u64 = 6_000;

/// Handles session rejection
pub(crate) struct InvalidSessionHandler;

impl InvalidSessionHandler {
    /// Retry the handshake after a uniform random delay
    ///
    /// The payload says whether the session is still resumable. When it is
    /// not, stored session state is wiped and a fresh identify goes out on
    /// the same connection.
    pub(crate) async fn handle(client: &Arc<GatewayInner>, message: &GatewayMessage) {
        let resumable = message.invalid_session_resumable();
        let delay = Duration::from_millis(
            rand::thread_rng().gen_range(RETRY_JITTER_MIN_MS..=RETRY_JITTER_MAX_MS),
        );

        tracing::warn!(
            resumable = resumable,
            delay_ms = delay.as_millis() as u64,
            "Session invalidated by server"
        );

        let client = Arc::clone(client);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if client.is_killed() {
                return;
            }

            if resumable {
                client.begin_resume().await;
            } else {
                client.reset_session().await;
                client.send_identify().await;
            }
        });
    }
}
