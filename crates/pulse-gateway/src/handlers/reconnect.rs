//! Reconnect handler (op 7)

use crate::connection::GatewayInner;
use std::sync::Arc;

/// Handles a server-requested reconnect
pub(crate) struct ReconnectHandler;

impl ReconnectHandler {
    /// Tear the connection down and re-open it, preserving the session so
    /// the next open resumes
    pub(crate) async fn handle(client: &Arc<GatewayInner>) {
        tracing::info!("Server requested reconnect");
        client.recycle("server requested reconnect").await;
    }
}
