//! Gateway wire protocol
//!
//! Op codes, close codes, the frame envelope and the typed payloads
//! exchanged with the gateway.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{
    wipes_session, CloseCode, CLOSE_GOING_AWAY, CLOSE_INTERNAL_RETRY, CLOSE_NORMAL,
};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    identify_properties, GuildDeletePayload, HelloPayload, IdentifyPayload, IdentifyProperties,
    LobbyConnectPayload, ReadyPayload, ReadyUser, RequestGuildMembersPayload, ResumePayload,
    StreamKeyPayload, VoiceServerUpdatePayload, VoiceStatePayload,
};

/// Gateway API version negotiated in the connection URL.
pub const GATEWAY_VERSION: u8 = 6;
