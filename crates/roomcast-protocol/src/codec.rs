//! Codec trait and implementations for turning envelopes into frames.
//!
//! The hub and the sessions only ever see bytes on one side and typed
//! values on the other. A [`Codec`] is the strategy that converts between
//! the two, so the wire format can change without touching routing code.
//!
//! [`JsonCodec`] is the format browsers speak and the one every
//! Roomcast server uses by default.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the hub actor owns one for the life
/// of the process and may run on any runtime worker thread.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be
    /// represented in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// truncated, or don't match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use roomcast_protocol::{Codec, Envelope, JsonCodec, MessageType};
///
/// let codec = JsonCodec;
/// let bytes = codec
///     .encode(&Envelope::new(MessageType::ChatMessage, "r1", "u1", "hi"))
///     .unwrap();
///
/// let decoded = Envelope::decode(&codec, &bytes).unwrap();
/// assert_eq!(decoded.content, "hi");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, MessageType};

    #[test]
    fn test_json_codec_produces_utf8_text() {
        let env = Envelope::new(MessageType::Typing, "r1", "u1", "");
        let bytes = JsonCodec.encode(&env).unwrap();
        let text = std::str::from_utf8(&bytes).expect("JSON is UTF-8");
        assert!(text.starts_with('{'));
    }

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let result: Result<serde_json::Value, _> =
            JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
