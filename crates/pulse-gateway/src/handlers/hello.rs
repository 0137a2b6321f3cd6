//! Hello handler (op 10)

use crate::connection::GatewayInner;
use crate::protocol::GatewayMessage;
use std::sync::Arc;

/// Handles the server greeting
pub(crate) struct HelloHandler;

impl HelloHandler {
    /// Arm the heartbeat controller with the interval from HELLO
    pub(crate) async fn handle(client: &Arc<GatewayInner>, message: &GatewayMessage) {
        let Some(hello) = message.as_hello() else {
            client.warn("HELLO payload missing heartbeat_interval".to_string()).await;
            return;
        };

        tracing::debug!(
            heartbeat_interval = hello.heartbeat_interval,
            "HELLO received"
        );

        client.start_heartbeat(hello.heartbeat_interval).await;
    }
}
