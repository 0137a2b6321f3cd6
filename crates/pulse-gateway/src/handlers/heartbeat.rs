//! Heartbeat handlers (ops 1 and 11)

use crate::connection::GatewayInner;
use std::sync::Arc;

/// Handles server-driven heartbeat traffic
pub(crate) struct HeartbeatHandler;

impl HeartbeatHandler {
    /// The server asked for a heartbeat: send one now, off schedule
    ///
    /// The periodic timer is not reset.
    pub(crate) async fn handle_request(client: &Arc<GatewayInner>) {
        tracing::trace!("Server requested a heartbeat");
        client.send_heartbeat().await;
    }

    /// The server acknowledged our heartbeat
    pub(crate) async fn handle_ack(client: &Arc<GatewayInner>) {
        client.heartbeat.lock().await.mark_acked();
        tracing::trace!("Heartbeat acknowledged");
    }
}
