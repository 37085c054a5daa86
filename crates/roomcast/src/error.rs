//! Unified error type for Roomcast.

use roomcast_hub::HubError;
use roomcast_protocol::ProtocolError;
use roomcast_session::SessionError;
use roomcast_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift any layer's error into this one.
#[derive(Debug, thiserror::Error)]
pub enum RoomcastError {
    /// Socket level: bind, accept, send, receive.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding an envelope.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// One client session ended badly (auth, oversized frame, deadline).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The hub has stopped.
    #[error(transparent)]
    Hub(#[from] HubError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let roomcast_err: RoomcastError = err.into();
        assert!(matches!(roomcast_err, RoomcastError::Transport(_)));
        assert!(roomcast_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownType("shout".into());
        let roomcast_err: RoomcastError = err.into();
        assert!(matches!(roomcast_err, RoomcastError::Protocol(_)));
        assert!(roomcast_err.to_string().contains("shout"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::FrameTooLarge {
            size: 600,
            limit: 512,
        };
        let roomcast_err: RoomcastError = err.into();
        assert!(matches!(roomcast_err, RoomcastError::Session(_)));
        assert!(roomcast_err.to_string().contains("512"));
    }

    #[test]
    fn test_from_hub_error() {
        let roomcast_err: RoomcastError = HubError::Unavailable.into();
        assert!(matches!(roomcast_err, RoomcastError::Hub(_)));
    }
}
