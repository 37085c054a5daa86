//! Hub configuration and the registry snapshot type.

use std::collections::BTreeMap;

use roomcast_protocol::RoomId;
use serde::{Deserialize, Serialize};

/// Default capacity of a session's outbound queue, in frames.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Default size of the hub's command queue.
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Configuration for the hub actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// How many commands (register, unregister, dispatch, ...) may be
    /// queued before senders wait. Session readers are the main senders,
    /// so this is also how far inbound traffic can run ahead of fan-out.
    pub command_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

// ---------------------------------------------------------------------------
// HubSnapshot
// ---------------------------------------------------------------------------

/// A point-in-time view of the registry, taken inside the hub loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubSnapshot {
    /// Registered sessions.
    pub sessions: usize,
    /// Users with a mapped session.
    pub users: usize,
    /// Member count per room. Only non-empty rooms appear.
    pub rooms: BTreeMap<RoomId, usize>,
}

impl HubSnapshot {
    /// Members currently in `room_id`, or `None` if the room doesn't exist.
    pub fn room_size(&self, room_id: &RoomId) -> Option<usize> {
        self.rooms.get(room_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_config_default() {
        assert_eq!(HubConfig::default().command_buffer, 64);
    }

    #[test]
    fn test_snapshot_room_size() {
        let mut snapshot = HubSnapshot::default();
        snapshot.rooms.insert(RoomId::from("r1"), 2);
        assert_eq!(snapshot.room_size(&RoomId::from("r1")), Some(2));
        assert_eq!(snapshot.room_size(&RoomId::from("r2")), None);
    }
}
