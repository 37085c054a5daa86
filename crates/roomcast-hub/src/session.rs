//! The hub's view of a session: identity plus the sending end of its
//! bounded outbound queue.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use roomcast_protocol::Identity;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::HubError;

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One encoded envelope, shared by every queue it is fanned out to.
pub type Frame = Arc<[u8]>;

/// Receiving end of a session's outbound queue, drained by its writer.
///
/// Yields `None` once the hub has dropped the session.
pub type Outbox = mpsc::Receiver<Frame>;

/// Unique per-connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// What the hub keeps per registered session.
///
/// Holds the only sender of the session's outbound queue, so when the hub
/// drops the handle the queue closes and the writer winds down. Not
/// `Clone` for the same reason.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    identity: Identity,
    outbox: mpsc::Sender<Frame>,
}

impl SessionHandle {
    /// Creates a handle with a fresh [`SessionId`] and an outbound queue
    /// holding at most `capacity` frames (at least one).
    pub fn new(identity: Identity, capacity: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: SessionId::next(),
            identity,
            outbox: tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Enqueues without waiting.
    pub(crate) fn try_deliver(&self, frame: &Frame) -> Result<(), HubError> {
        self.outbox
            .try_send(Arc::clone(frame))
            .map_err(|e| match e {
                TrySendError::Full(_) => HubError::QueueFull(self.id),
                TrySendError::Closed(_) => HubError::QueueClosed(self.id),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("r1", "A", "alice")
    }

    #[test]
    fn test_session_ids_are_unique() {
        let (a, _rx_a) = SessionHandle::new(alice(), 4);
        let (b, _rx_b) = SessionHandle::new(alice(), 4);
        assert_ne!(a.id(), b.id());
        assert!(a.id().to_string().starts_with("S-"));
    }

    #[test]
    fn test_try_deliver_reports_full_queue() {
        let (handle, mut rx) = SessionHandle::new(alice(), 2);
        let frame: Frame = Arc::from(&b"x"[..]);

        handle.try_deliver(&frame).unwrap();
        handle.try_deliver(&frame).unwrap();
        assert!(matches!(
            handle.try_deliver(&frame),
            Err(HubError::QueueFull(id)) if id == handle.id()
        ));

        // Draining makes room again.
        assert_eq!(&*rx.try_recv().unwrap(), b"x");
        handle.try_deliver(&frame).unwrap();
    }

    #[test]
    fn test_try_deliver_reports_closed_queue() {
        let (handle, rx) = SessionHandle::new(alice(), 2);
        drop(rx);
        assert!(matches!(
            handle.try_deliver(&Arc::from(&b"x"[..])),
            Err(HubError::QueueClosed(_))
        ));
    }

    #[test]
    fn test_dropping_handle_closes_queue() {
        let (handle, mut rx) = SessionHandle::new(alice(), 2);
        handle.try_deliver(&Arc::from(&b"last"[..])).unwrap();
        drop(handle);

        // Buffered frames are still drained before the close is seen.
        assert_eq!(&*rx.try_recv().unwrap(), b"last");
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (handle, _rx) = SessionHandle::new(alice(), 0);
        handle.try_deliver(&Arc::from(&b"x"[..])).unwrap();
    }
}
