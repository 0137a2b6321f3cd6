//! Dispatch handler (op 0)
//!
//! Routes dispatch events by name. READY, RESUMED and the voice/guild
//! control events feed the engine's own state; everything is forwarded to
//! the application except the two session events, which surface as typed
//! notifications instead.

use crate::connection::GatewayInner;
use crate::events::GatewayEvent;
use crate::protocol::GatewayMessage;
use std::sync::Arc;

/// Routes dispatch events
pub(crate) struct DispatchHandler;

impl DispatchHandler {
    pub(crate) async fn handle(client: &Arc<GatewayInner>, message: GatewayMessage) {
        let Some(name) = message.t.clone() else {
            client.warn("dispatch frame without an event name".to_string()).await;
            return;
        };

        match name.as_str() {
            "READY" => {
                Self::ready(client, &message).await;
                return;
            }
            "RESUMED" => {
                Self::resumed(client).await;
                return;
            }
            "GUILD_DELETE" => Self::guild_delete(client, &message).await,
            "VOICE_SERVER_UPDATE" => Self::voice_server_update(client, &message).await,
            "VOICE_STATE_UPDATE" => Self::voice_state_update(client, &message).await,
            _ => {}
        }

        client.forward_dispatch(name, message).await;
    }

    async fn ready(client: &Arc<GatewayInner>, message: &GatewayMessage) {
        let Some(ready) = message.as_ready() else {
            client.warn("READY payload missing session identity".to_string()).await;
            return;
        };

        client.session_ready(&ready).await;
        client
            .emit(GatewayEvent::Ready {
                session_id: ready.session_id,
                user_id: ready.user.id,
            })
            .await;
    }

    async fn resumed(client: &Arc<GatewayInner>) {
        client.session_resumed().await;
        client.emit(GatewayEvent::Resumed).await;
    }

    /// A guild went away; its media session, if any, goes with it
    async fn guild_delete(client: &Arc<GatewayInner>, message: &GatewayMessage) {
        let Some(guild) = message.d.as_ref().and_then(|d| {
            serde_json::from_value::<crate::protocol::GuildDeletePayload>(d.clone()).ok()
        }) else {
            return;
        };

        let reason = if guild.unavailable {
            "guild became unavailable"
        } else {
            "left the guild"
        };
        client.voice.kill(&guild.id, Some(reason));
    }

    /// New media endpoint and token for a server we hold a session on
    async fn voice_server_update(client: &Arc<GatewayInner>, message: &GatewayMessage) {
        let Some(update) = message.as_voice_server() else {
            return;
        };
        let Some(server_id) = update.server_id() else {
            return;
        };

        if let Some(session) = client.voice.get(server_id) {
            tracing::debug!(server_id = %server_id, endpoint = %update.endpoint, "Voice server update");
            session.set_endpoint(update.endpoint.clone());
            session.set_token(update.token.clone());
        }
    }

    /// Our own voice state changed; reconcile the media session
    async fn voice_state_update(client: &Arc<GatewayInner>, message: &GatewayMessage) {
        let Some(state) = message.as_voice_state() else {
            return;
        };

        // Only this client's own state drives the registry.
        let ours = client.session.read().await.user_id.clone();
        if ours.is_none() || state.user_id != ours {
            return;
        }

        let Some(server_id) = state.server_id().map(str::to_string) else {
            return;
        };
        let Some(session) = client.voice.get(&server_id) else {
            return;
        };

        match &state.channel_id {
            None => {
                client.voice.kill(&server_id, Some("voice channel left"));
            }
            Some(channel_id) => {
                let known = session.session_id();
                if known.is_some() && state.session_id.is_some() && known != state.session_id {
                    client
                        .voice
                        .kill(&server_id, Some("superseded by a different session"));
                    return;
                }

                session.set_channel_id(Some(channel_id.clone()));
                client.voice.resolve(&server_id);
            }
        }
    }
}
