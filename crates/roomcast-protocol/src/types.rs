//! Core protocol types for Roomcast's wire format.
//!
//! Every frame on the wire, in both directions, is one JSON [`Envelope`]:
//!
//! ```text
//! {
//!   "type": "message|typing|read_receipt|user_joined|user_left|error",
//!   "roomId": "r1",
//!   "userId": "42",
//!   "content": "hi",
//!   "timestamp": "2024-05-01T12:00:00Z",
//!   "metadata": { "isTyping": true, "readBy": ["7"], "userName": "alice" }
//! }
//! ```
//!
//! Clients are not trusted with identity: `userId`, `roomId` and
//! `timestamp` on inbound envelopes are replaced by the hub (see
//! [`Envelope::stamp`]). Metadata is decoded field by field and a bad
//! field is dropped on its own, so a recognized message is still routed
//! when its metadata is partly garbage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Codec, ProtocolError};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of a room. Rooms only exist while someone is in them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque identifier of a user, as issued by the upstream auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The validated `(room, user, display name)` triple a connection is
/// admitted with. The hub trusts it completely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub display_name: String,
}

impl Identity {
    pub fn new(
        room_id: impl Into<RoomId>,
        user_id: impl Into<UserId>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The closed set of envelope types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// A chat line. Never echoed back to its sender.
    #[serde(rename = "message")]
    ChatMessage,
    /// "User is typing" on/off, carried in `metadata.isTyping`.
    #[serde(rename = "typing")]
    Typing,
    /// Who has read what, carried in `metadata.readBy`.
    #[serde(rename = "read_receipt")]
    ReadReceipt,
    /// Presence: someone joined the room.
    #[serde(rename = "user_joined")]
    UserJoined,
    /// Presence: someone left the room.
    #[serde(rename = "user_left")]
    UserLeft,
    /// Server-to-client error notice. Not routable between clients.
    #[serde(rename = "error")]
    Error,
}

impl MessageType {
    /// The tag used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatMessage => "message",
            Self::Typing => "typing",
            Self::ReadReceipt => "read_receipt",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::Error => "error",
        }
    }

    /// Who inside the room receives an envelope of this type, or `None`
    /// if clients may not send it at all.
    ///
    /// Chat lines skip the sender (the client already rendered its own
    /// line); everything else is echoed so the sender gets confirmation.
    pub fn fan_out(self) -> Option<FanOut> {
        match self {
            Self::ChatMessage => Some(FanOut::RoomExceptSender),
            Self::Typing
            | Self::ReadReceipt
            | Self::UserJoined
            | Self::UserLeft => Some(FanOut::Room),
            Self::Error => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::ChatMessage),
            "typing" => Ok(Self::Typing),
            "read_receipt" => Ok(Self::ReadReceipt),
            "user_joined" => Ok(Self::UserJoined),
            "user_left" => Ok(Self::UserLeft),
            "error" => Ok(Self::Error),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

/// Which members of a room an envelope is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// Every member, sender included.
    Room,
    /// Every member except the sender.
    RoomExceptSender,
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Optional, type-specific extras.
///
/// Each field is decoded on its own: `{"isTyping": "yes", "userName": "al"}`
/// yields `is_typing: None, user_name: Some("al")` instead of failing the
/// whole envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub is_typing: Option<bool>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub read_by: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Display name, set on presence events.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
}

impl Metadata {
    /// Metadata carrying only a display name.
    pub fn display_name(name: impl Into<String>) -> Self {
        Self {
            user_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Decodes `T`, or yields `None` if the value has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient<T> {
        Valid(T),
        Invalid(IgnoredAny),
    }

    Ok(match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Valid(value) => Some(value),
        Lenient::Invalid(_) => None,
    })
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The unit of communication, in both directions.
///
/// `Deserialize` here is strict about the required fields and is what a
/// client uses to read server frames. Inbound client frames go through
/// [`Envelope::decode`] instead, which tolerates the fields the hub is
/// going to overwrite anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub room_id: RoomId,
    pub user_id: UserId,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub metadata: Metadata,
}

/// Shape of a client frame before the hub stamps it. Only `type` is
/// required.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    room_id: Option<RoomId>,
    #[serde(default, deserialize_with = "lenient")]
    user_id: Option<UserId>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    metadata: Metadata,
}

impl Envelope {
    /// A fresh envelope timestamped now, with empty metadata.
    pub fn new(
        kind: MessageType,
        room_id: impl Into<RoomId>,
        user_id: impl Into<UserId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            room_id: room_id.into(),
            user_id: user_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: Metadata::default(),
        }
    }

    /// `user_joined` for `identity`, carrying its display name.
    pub fn user_joined(identity: &Identity) -> Self {
        Self::presence(MessageType::UserJoined, identity)
    }

    /// `user_left` for `identity`, carrying its display name.
    pub fn user_left(identity: &Identity) -> Self {
        Self::presence(MessageType::UserLeft, identity)
    }

    fn presence(kind: MessageType, identity: &Identity) -> Self {
        Self::new(
            kind,
            identity.room_id.clone(),
            identity.user_id.clone(),
            "",
        )
        .with_metadata(Metadata::display_name(&identity.display_name))
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Decodes a client frame.
    ///
    /// # Errors
    /// - [`ProtocolError::Decode`] if the bytes are not an object of the
    ///   right shape
    /// - [`ProtocolError::InvalidMessage`] if `type` is missing
    /// - [`ProtocolError::UnknownType`] if `type` is not one of the six
    pub fn decode<C: Codec>(codec: &C, data: &[u8]) -> Result<Self, ProtocolError> {
        let raw: InboundEnvelope = codec.decode(data)?;
        let kind: MessageType = raw
            .kind
            .ok_or_else(|| ProtocolError::InvalidMessage("missing type".into()))?
            .parse()?;

        Ok(Self {
            kind,
            room_id: raw.room_id.unwrap_or_default(),
            user_id: raw.user_id.unwrap_or_default(),
            content: raw.content.unwrap_or_default(),
            timestamp: raw.timestamp.unwrap_or_else(Utc::now),
            metadata: raw.metadata,
        })
    }

    /// Overwrites the server-authoritative fields with the sender's
    /// identity and the current time.
    pub fn stamp(&mut self, sender: &Identity) {
        self.room_id = sender.room_id.clone();
        self.user_id = sender.user_id.clone();
        self.timestamp = Utc::now();
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::JsonCodec;

    fn decode(json: &str) -> Result<Envelope, ProtocolError> {
        Envelope::decode(&JsonCodec, json.as_bytes())
    }

    #[test]
    fn test_message_type_wire_tags() {
        let tags: Vec<String> = [
            MessageType::ChatMessage,
            MessageType::Typing,
            MessageType::ReadReceipt,
            MessageType::UserJoined,
            MessageType::UserLeft,
            MessageType::Error,
        ]
        .iter()
        .map(|t| serde_json::to_string(t).unwrap())
        .collect();

        assert_eq!(
            tags,
            [
                "\"message\"",
                "\"typing\"",
                "\"read_receipt\"",
                "\"user_joined\"",
                "\"user_left\"",
                "\"error\""
            ]
        );
    }

    #[test]
    fn test_message_type_from_str_matches_serde() {
        for kind in [
            MessageType::ChatMessage,
            MessageType::ReadReceipt,
            MessageType::UserLeft,
        ] {
            assert_eq!(kind.as_str().parse::<MessageType>().unwrap(), kind);
        }
        assert!(matches!(
            "poke".parse::<MessageType>(),
            Err(ProtocolError::UnknownType(t)) if t == "poke"
        ));
    }

    #[test]
    fn test_fan_out_excludes_sender_only_for_chat() {
        assert_eq!(
            MessageType::ChatMessage.fan_out(),
            Some(FanOut::RoomExceptSender)
        );
        assert_eq!(MessageType::Typing.fan_out(), Some(FanOut::Room));
        assert_eq!(MessageType::ReadReceipt.fan_out(), Some(FanOut::Room));
        assert_eq!(MessageType::UserJoined.fan_out(), Some(FanOut::Room));
        assert_eq!(MessageType::UserLeft.fan_out(), Some(FanOut::Room));
        assert_eq!(MessageType::Error.fan_out(), None);
    }

    #[test]
    fn test_envelope_json_uses_camel_case_fields() {
        let env = Envelope::new(MessageType::ChatMessage, "r1", "A", "hi");
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();

        assert_eq!(json["type"], "message");
        assert_eq!(json["roomId"], "r1");
        assert_eq!(json["userId"], "A");
        assert_eq!(json["content"], "hi");
        assert!(json["metadata"].as_object().unwrap().is_empty());

        let ts = json["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok(), "not RFC3339: {ts}");
    }

    #[test]
    fn test_presence_carries_display_name() {
        let alice = Identity::new("r1", "A", "alice");
        let joined = Envelope::user_joined(&alice);
        let json: serde_json::Value = serde_json::to_value(&joined).unwrap();

        assert_eq!(json["type"], "user_joined");
        assert_eq!(json["userId"], "A");
        assert_eq!(json["metadata"]["userName"], "alice");
        assert!(json["metadata"].get("isTyping").is_none());

        assert_eq!(Envelope::user_left(&alice).kind, MessageType::UserLeft);
    }

    #[test]
    fn test_decode_minimal_client_frame() {
        let env = decode(r#"{"type":"message","content":"hi"}"#).unwrap();
        assert_eq!(env.kind, MessageType::ChatMessage);
        assert_eq!(env.content, "hi");
        assert_eq!(env.user_id, UserId::default());
    }

    #[test]
    fn test_decode_typing_metadata() {
        let env =
            decode(r#"{"type":"typing","metadata":{"isTyping":true}}"#).unwrap();
        assert_eq!(env.kind, MessageType::Typing);
        assert_eq!(env.metadata.is_typing, Some(true));
    }

    #[test]
    fn test_malformed_metadata_field_is_dropped_alone() {
        let env = decode(
            r#"{"type":"read_receipt","metadata":{"isTyping":"yes","readBy":["1",2],"messageId":"m9"}}"#,
        )
        .unwrap();
        assert_eq!(env.kind, MessageType::ReadReceipt);
        assert_eq!(env.metadata.is_typing, None);
        assert_eq!(env.metadata.read_by, None);
        assert_eq!(env.metadata.message_id.as_deref(), Some("m9"));
    }

    #[test]
    fn test_non_object_metadata_does_not_block_delivery() {
        let env = decode(r#"{"type":"message","content":"x","metadata":"oops"}"#)
            .unwrap();
        assert_eq!(env.metadata, Metadata::default());

        let env = decode(r#"{"type":"message","metadata":null}"#).unwrap();
        assert_eq!(env.metadata, Metadata::default());
    }

    #[test]
    fn test_decode_ignores_garbage_in_server_owned_fields() {
        let env = decode(
            r#"{"type":"message","userId":17,"roomId":["x"],"timestamp":"yesterday"}"#,
        )
        .unwrap();
        assert_eq!(env.kind, MessageType::ChatMessage);
    }

    #[test]
    fn test_decode_rejects_unknown_and_missing_type() {
        assert!(matches!(
            decode(r#"{"type":"call_started"}"#),
            Err(ProtocolError::UnknownType(_))
        ));
        assert!(matches!(
            decode(r#"{"content":"hi"}"#),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_decode_rejects_undecodable_payloads() {
        assert!(matches!(decode("not json"), Err(ProtocolError::Decode(_))));
        assert!(matches!(decode("[1,2,3]"), Err(ProtocolError::Decode(_))));
        assert!(matches!(
            decode(r#"{"type":"message","content":5}"#),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_stamp_overwrites_spoofed_identity() {
        let mut env = decode(
            r#"{"type":"message","userId":"admin","roomId":"other","timestamp":"2001-01-01T00:00:00Z","content":"hi"}"#,
        )
        .unwrap();
        let sender = Identity::new("r1", "A", "alice");
        let before = Utc::now();

        env.stamp(&sender);

        assert_eq!(env.user_id, UserId::from("A"));
        assert_eq!(env.room_id, RoomId::from("r1"));
        assert!(env.timestamp >= before);
        assert_eq!(env.content, "hi");
    }

    #[test]
    fn test_strict_deserialize_reads_server_frames() {
        let frame = r#"{"type":"user_left","roomId":"r1","userId":"B","content":"","timestamp":"2024-05-01T12:00:00Z","metadata":{"userName":"bob"}}"#;
        let env: Envelope = serde_json::from_str(frame).unwrap();
        assert_eq!(env.kind, MessageType::UserLeft);
        assert_eq!(env.metadata.user_name.as_deref(), Some("bob"));

        let missing_user = r#"{"type":"message","roomId":"r1","timestamp":"2024-05-01T12:00:00Z"}"#;
        assert!(serde_json::from_str::<Envelope>(missing_user).is_err());
    }
}
