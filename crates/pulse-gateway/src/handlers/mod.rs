//! Op code handlers
//!
//! Routes decoded gateway frames to the handler for their operation code.
//! Nothing here raises: every failure path degrades to a warn notification
//! and drops the frame.

mod dispatch;
mod heartbeat;
mod hello;
mod invalid_session;
mod reconnect;

pub(crate) use dispatch::DispatchHandler;
pub(crate) use heartbeat::HeartbeatHandler;
pub(crate) use hello::HelloHandler;
pub(crate) use invalid_session::InvalidSessionHandler;
pub(crate) use reconnect::ReconnectHandler;

use crate::connection::GatewayInner;
use crate::protocol::{GatewayMessage, OpCode};
use std::sync::Arc;

/// Dispatch incoming server messages to the appropriate handlers
pub(crate) struct MessageDispatcher;

impl MessageDispatcher {
    /// Handle an incoming server message
    pub(crate) async fn dispatch(client: &Arc<GatewayInner>, message: GatewayMessage) {
        // Validate that this is a server-sendable op code
        if !message.op.is_server_op() {
            tracing::warn!(op = %message.op, "Received client-only op code from server");
            return;
        }

        tracing::trace!(op = %message.op, "Received message");

        // Sequence tracking applies to every sequenced frame, whatever
        // its op.
        if let Some(sequence) = message.s {
            client.observe_sequence(sequence).await;
        }

        match message.op {
            OpCode::Heartbeat => HeartbeatHandler::handle_request(client).await,
            OpCode::HeartbeatAck => HeartbeatHandler::handle_ack(client).await,
            OpCode::Hello => HelloHandler::handle(client, &message).await,
            OpCode::InvalidSession => InvalidSessionHandler::handle(client, &message).await,
            OpCode::Reconnect => ReconnectHandler::handle(client).await,
            OpCode::Dispatch => DispatchHandler::handle(client, message).await,
            // Unreachable thanks to the is_server_op check.
            other => {
                tracing::error!(op = %other, "Unhandled server op code");
            }
        }
    }
}
