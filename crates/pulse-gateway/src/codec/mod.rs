//! Frame encoding
//!
//! Encodes and decodes gateway frames under the negotiated encoding. The
//! text encoding is JSON; the binary encoding is the external term format,
//! available only when the `etf` feature is compiled in.

mod decompress;

pub use decompress::{DecompressError, StreamDecompressor, FRAME_MARKER};

use crate::options::ConfigError;
use crate::protocol::GatewayMessage;
use thiserror::Error;

/// Wire encoding for gateway frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Text JSON frames
    Json,
    /// Binary external-term-format frames (requires the `etf` feature)
    Etf,
}

impl Encoding {
    /// The value used in the gateway URL's `encoding` query parameter
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Etf => "etf",
        }
    }

    /// Whether this encoding is compiled into the build
    #[must_use]
    pub const fn is_available(self) -> bool {
        match self {
            Self::Json => true,
            Self::Etf => cfg!(feature = "etf"),
        }
    }

    /// The preferred encoding for this build: binary when available,
    /// JSON otherwise.
    #[must_use]
    pub const fn preferred() -> Self {
        if cfg!(feature = "etf") {
            Self::Etf
        } else {
            Self::Json
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Codec errors
///
/// Non-fatal at the protocol layer: a failed encode drops the frame, a
/// failed decode drops the message, both with a warning.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "etf")]
    #[error("ETF encode error: {0}")]
    EtfEncode(String),

    #[cfg(feature = "etf")]
    #[error("ETF decode error: {0}")]
    EtfDecode(String),
}

/// Frame codec for the selected encoding
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    encoding: Encoding,
}

impl Codec {
    /// Create a codec for the given encoding
    ///
    /// # Errors
    /// Returns `ConfigError::EncodingUnavailable` when the binary encoding
    /// is selected but not compiled in.
    pub fn new(encoding: Encoding) -> Result<Self, ConfigError> {
        if !encoding.is_available() {
            return Err(ConfigError::EncodingUnavailable(encoding.wire_name()));
        }
        Ok(Self { encoding })
    }

    /// The encoding this codec speaks
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Whether encoded frames travel as binary transport messages
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self.encoding, Encoding::Etf)
    }

    /// Encode a frame to wire bytes
    pub fn encode(&self, message: &GatewayMessage) -> Result<Vec<u8>, CodecError> {
        match self.encoding {
            Encoding::Json => Ok(serde_json::to_vec(message)?),
            #[cfg(feature = "etf")]
            Encoding::Etf => {
                serde_eetf::to_bytes(message).map_err(|e| CodecError::EtfEncode(e.to_string()))
            }
            #[cfg(not(feature = "etf"))]
            Encoding::Etf => unreachable!("rejected at construction"),
        }
    }

    /// Decode wire bytes into a frame
    pub fn decode(&self, bytes: &[u8]) -> Result<GatewayMessage, CodecError> {
        match self.encoding {
            Encoding::Json => Ok(serde_json::from_slice(bytes)?),
            #[cfg(feature = "etf")]
            Encoding::Etf => {
                serde_eetf::from_bytes(bytes).map_err(|e| CodecError::EtfDecode(e.to_string()))
            }
            #[cfg(not(feature = "etf"))]
            Encoding::Etf => unreachable!("rejected at construction"),
        }
    }

    /// Decode a frame delivered as a sequence of chunks
    ///
    /// Chunks are concatenated in order before parsing.
    pub fn decode_chunks(&self, chunks: &[&[u8]]) -> Result<GatewayMessage, CodecError> {
        let total = chunks.iter().map(|c| c.len()).sum();
        let mut buffer = Vec::with_capacity(total);
        for chunk in chunks {
            buffer.extend_from_slice(chunk);
        }
        self.decode(&buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpCode;

    #[test]
    fn test_json_always_available() {
        assert!(Encoding::Json.is_available());
        assert!(Codec::new(Encoding::Json).is_ok());
    }

    #[test]
    fn test_etf_requires_feature() {
        assert_eq!(Encoding::Etf.is_available(), cfg!(feature = "etf"));
        assert_eq!(Codec::new(Encoding::Etf).is_ok(), cfg!(feature = "etf"));
    }

    #[test]
    fn test_preferred_matches_build() {
        if cfg!(feature = "etf") {
            assert_eq!(Encoding::preferred(), Encoding::Etf);
        } else {
            assert_eq!(Encoding::preferred(), Encoding::Json);
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let codec = Codec::new(Encoding::Json).unwrap();
        let msg = GatewayMessage {
            op: OpCode::Dispatch,
            d: Some(serde_json::json!({"content": "hello"})),
            s: Some(12),
            t: Some("MESSAGE_CREATE".to_string()),
        };

        let bytes = codec.encode(&msg).unwrap();
        let back = codec.decode(&bytes).unwrap();

        assert_eq!(back.op, msg.op);
        assert_eq!(back.d, msg.d);
        assert_eq!(back.s, msg.s);
        assert_eq!(back.t, msg.t);
    }

    #[cfg(feature = "etf")]
    #[test]
    fn test_etf_roundtrip() {
        let codec = Codec::new(Encoding::Etf).unwrap();
        let msg = GatewayMessage::heartbeat(Some(3));

        let bytes = codec.encode(&msg).unwrap();
        let back = codec.decode(&bytes).unwrap();

        assert_eq!(back.op, msg.op);
        assert_eq!(back.d, msg.d);
    }

    #[test]
    fn test_decode_chunks_matches_contiguous() {
        let codec = Codec::new(Encoding::Json).unwrap();
        let bytes = codec.encode(&GatewayMessage::heartbeat(Some(9))).unwrap();

        let (head, tail) = bytes.split_at(bytes.len() / 2);
        let chunked = codec.decode_chunks(&[head, tail]).unwrap();
        let whole = codec.decode(&bytes).unwrap();

        assert_eq!(chunked.op, whole.op);
        assert_eq!(chunked.d, whole.d);
    }

    #[test]
    fn test_decode_garbage_is_error_not_panic() {
        let codec = Codec::new(Encoding::Json).unwrap();
        assert!(codec.decode(b"{not json").is_err());
    }
}
