//! Error types for the hub layer.

use crate::SessionId;

/// Errors that can occur talking to the hub or delivering to a session.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub task has stopped and its command queue is closed.
    #[error("hub is unavailable")]
    Unavailable,

    /// A session's outbound queue is full. The session is too slow to
    /// keep up and gets disconnected.
    #[error("outbound queue of session {0} is full")]
    QueueFull(SessionId),

    /// A session's outbound queue has no reader any more.
    #[error("outbound queue of session {0} is closed")]
    QueueClosed(SessionId),
}
