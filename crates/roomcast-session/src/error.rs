//! Error types for the session layer.

use roomcast_hub::HubError;
use roomcast_transport::TransportError;

/// Errors that end a client session (or keep one from starting).
///
/// Every variant is fatal to one connection only.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The upgrade request did not carry a usable identity.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The client sent a frame larger than the configured limit.
    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    /// No pong arrived before the read deadline.
    #[error("read deadline exceeded")]
    ReadTimeout,

    /// A write or ping did not complete before the write deadline.
    #[error("write deadline exceeded")]
    WriteTimeout,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Hub(#[from] HubError),
}
