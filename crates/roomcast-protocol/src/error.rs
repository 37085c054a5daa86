//! Error types for the protocol layer.
//!
//! A `ProtocolError` always concerns a single payload. The hub treats
//! every one of them as recoverable: the payload is logged and dropped
//! and the connection it came from stays open.

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, wrong field types, or a
    /// truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The payload decoded, but its `type` is not one we route.
    #[error("unknown message type {0:?}")]
    UnknownType(String),

    /// The payload decoded, but violates protocol rules (for example a
    /// missing `type`).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
