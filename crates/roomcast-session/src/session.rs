//! Session configuration and the session state machine.

use std::fmt;
use std::time::Duration;

use roomcast_hub::DEFAULT_OUTBOUND_CAPACITY;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timeouts and limits applied to every client session.
///
/// Sensible defaults are provided; override just the fields you care
/// about:
///
/// ```rust
/// use std::time::Duration;
/// use roomcast_session::SessionConfig;
///
/// let config = SessionConfig {
///     read_timeout: Duration::from_secs(30),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.ping_interval(), Duration::from_secs(27));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a freshly accepted socket has to finish the WebSocket
    /// upgrade before it is dropped.
    ///
    /// Default: 10 seconds.
    pub handshake_timeout: Duration,

    /// How long the reader waits for a pong before giving up on the
    /// client. Data frames do not extend it.
    ///
    /// Default: 60 seconds.
    pub read_timeout: Duration,

    /// Deadline for a single write (a batch of frames, a ping or the
    /// close frame).
    ///
    /// Default: 10 seconds.
    pub write_timeout: Duration,

    /// Largest inbound frame accepted, in bytes. A bigger frame ends
    /// the session. The transport enforces it while reading, so an
    /// oversized message is never buffered in full.
    ///
    /// Default: 512.
    pub max_frame_bytes: usize,

    /// Frames the hub may queue for this client before it is considered
    /// too slow and disconnected.
    ///
    /// Default: 256.
    pub outbound_capacity: usize,
}

impl SessionConfig {
    /// How often the writer pings: 9/10 of the read timeout, so a pong
    /// has time to arrive before the deadline.
    pub fn ping_interval(&self) -> Duration {
        self.read_timeout * 9 / 10
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_frame_bytes: 512,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of a client session.
///
/// ```text
///   Connecting ──(registered)──→ Active ──(first fatal error)──→ Closing
///        │                                                         ▲  │
///        └──────────────────(registration refused)─────────────────┘  │
///                                      (queue closed, socket released)
///                                                                     ▼
///                                                                  Closed
/// ```
///
/// States only move forward, so they are ordered: `Closing` and
/// everything after it compare greater than `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Authenticated, not yet registered with the hub.
    Connecting,

    /// Registered; frames flow both ways.
    Active,

    /// The reader or writer hit a fatal condition and the session is
    /// winding down.
    Closing,

    /// Unregistered and the socket released. Terminal.
    Closed,
}

impl SessionState {
    /// `true` once the session has started shutting down.
    pub fn is_closing(self) -> bool {
        self >= SessionState::Closing
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}
