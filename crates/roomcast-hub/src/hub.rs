//! The connection hub: a single Tokio task that owns every registry map.
//!
//! Sessions never touch room membership directly. They send commands
//! through a [`HubHandle`], and the hub applies them one at a time, so no
//! two operations ever observe the maps mid-update and no locks are
//! needed.
//!
//! Fan-out never waits on a slow client: each target's queue is filled
//! with `try_send`, and a target whose queue is full (or already closed)
//! is dropped from the hub on the spot. Dropping its handle closes its
//! queue, which is what tells its writer to hang up.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use roomcast_protocol::{Codec, Envelope, FanOut, Identity, RoomId, UserId};
use tokio::sync::{mpsc, oneshot};

use crate::{Frame, HubConfig, HubError, HubSnapshot, SessionHandle, SessionId};

/// Commands sent to the hub actor through its channel.
pub(crate) enum HubCommand {
    /// Add a session to the registry, its room and the user map.
    Register {
        session: SessionHandle,
        reply: oneshot::Sender<()>,
    },

    /// Remove a session everywhere. No-op if it is already gone.
    Unregister { id: SessionId },

    /// Route a raw client frame from `sender` to its room.
    Dispatch { sender: SessionId, data: Vec<u8> },

    /// Deliver a raw frame to every registered session.
    BroadcastAll { data: Vec<u8> },

    /// Deliver a raw frame to the session mapped for `user_id`.
    SendToUser { user_id: UserId, data: Vec<u8> },

    Snapshot {
        reply: oneshot::Sender<HubSnapshot>,
    },

    UserSession {
        user_id: UserId,
        reply: oneshot::Sender<Option<SessionId>>,
    },

    /// Drop every session and stop.
    Shutdown,
}

/// Handle to the running hub. Cheap to clone; every session holds one.
///
/// All methods fail with [`HubError::Unavailable`] once the hub has
/// stopped.
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Registers a session and waits until the hub has applied it, so
    /// that by the time this returns the room has seen `user_joined`.
    pub async fn register(&self, session: SessionHandle) -> Result<(), HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Register {
            session,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::Unavailable)
    }

    pub async fn unregister(&self, id: SessionId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister { id }).await
    }

    /// Hands a raw inbound frame to the hub (fire-and-forget).
    pub async fn dispatch(
        &self,
        sender: SessionId,
        data: Vec<u8>,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Dispatch { sender, data }).await
    }

    /// Sends a system notice to every connected session, in every room.
    pub async fn broadcast_all(&self, data: Vec<u8>) -> Result<(), HubError> {
        self.send(HubCommand::BroadcastAll { data }).await
    }

    /// Sends a frame to one user's current session, if they have one.
    pub async fn send_to_user(
        &self,
        user_id: UserId,
        data: Vec<u8>,
    ) -> Result<(), HubError> {
        self.send(HubCommand::SendToUser { user_id, data }).await
    }

    /// Takes a snapshot of the registry. Because commands are applied in
    /// order, the snapshot reflects everything sent through this handle
    /// before the call.
    pub async fn snapshot(&self) -> Result<HubSnapshot, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Snapshot { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| HubError::Unavailable)
    }

    /// The session currently mapped for `user_id`.
    pub async fn user_session(
        &self,
        user_id: UserId,
    ) -> Result<Option<SessionId>, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::UserSession {
            user_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Tells the hub to drop every session and stop.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        self.send(HubCommand::Shutdown).await
    }

    /// Returns `true` once the hub task has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), HubError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| HubError::Unavailable)
    }
}

/// The hub actor state. Runs inside a single Tokio task.
struct ConnectionHub<C: Codec> {
    codec: C,
    /// Every registered session. Holding the handle keeps its queue open.
    sessions: HashMap<SessionId, SessionHandle>,
    /// Room membership. A room is present iff it has members.
    rooms: HashMap<RoomId, HashSet<SessionId>>,
    /// Last registered session per user.
    users: HashMap<UserId, SessionId>,
    receiver: mpsc::Receiver<HubCommand>,
}

impl<C: Codec> ConnectionHub<C> {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!("hub started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                HubCommand::Register { session, reply } => {
                    self.handle_register(session);
                    let _ = reply.send(());
                }
                HubCommand::Unregister { id } => self.handle_unregister(id),
                HubCommand::Dispatch { sender, data } => {
                    self.handle_dispatch(sender, &data);
                }
                HubCommand::BroadcastAll { data } => {
                    let targets: Vec<SessionId> =
                        self.sessions.keys().copied().collect();
                    let failed = self.deliver(targets, &Frame::from(data));
                    self.evict(failed);
                }
                HubCommand::SendToUser { user_id, data } => {
                    self.handle_send_to_user(&user_id, data);
                }
                HubCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                HubCommand::UserSession { user_id, reply } => {
                    let _ = reply.send(self.users.get(&user_id).copied());
                }
                HubCommand::Shutdown => {
                    tracing::info!(
                        sessions = self.sessions.len(),
                        "hub shutting down"
                    );
                    break;
                }
            }
        }

        // Dropping the handles closes every outbound queue.
        self.sessions.clear();
        self.rooms.clear();
        self.users.clear();
        tracing::info!("hub stopped");
    }

    fn handle_register(&mut self, session: SessionHandle) {
        let id = session.id();
        let identity = session.identity().clone();

        if let Some(previous) = self.users.insert(identity.user_id.clone(), id) {
            // Last registration wins the lookup; the older connection
            // stays in its room and keeps receiving broadcasts.
            tracing::debug!(
                user_id = %identity.user_id,
                %previous,
                current = %id,
                "user session superseded"
            );
        }
        let members = self.rooms.entry(identity.room_id.clone()).or_default();
        members.insert(id);
        let room_size = members.len();
        self.sessions.insert(id, session);

        tracing::info!(
            session_id = %id,
            room_id = %identity.room_id,
            user_id = %identity.user_id,
            members = room_size,
            "session registered"
        );

        self.publish(&identity.room_id, &Envelope::user_joined(&identity), None);
    }

    fn handle_unregister(&mut self, id: SessionId) {
        match self.remove_session(id) {
            Some(identity) => {
                tracing::info!(
                    session_id = %id,
                    room_id = %identity.room_id,
                    user_id = %identity.user_id,
                    "session unregistered"
                );
                self.announce_departure(&identity);
            }
            None => {
                tracing::debug!(session_id = %id, "session already unregistered");
            }
        }
    }

    fn handle_dispatch(&mut self, sender: SessionId, data: &[u8]) {
        let Some(identity) = self
            .sessions
            .get(&sender)
            .map(|session| session.identity().clone())
        else {
            tracing::debug!(%sender, "message from unregistered session, ignoring");
            return;
        };

        let mut envelope = match Envelope::decode(&self.codec, data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%sender, error = %e, "dropping inbound payload");
                return;
            }
        };
        envelope.stamp(&identity);

        let exclude = match envelope.kind.fan_out() {
            Some(FanOut::Room) => None,
            Some(FanOut::RoomExceptSender) => Some(sender),
            None => {
                tracing::debug!(
                    %sender,
                    kind = %envelope.kind,
                    "message type is not routable, dropping"
                );
                return;
            }
        };

        self.publish(&identity.room_id, &envelope, exclude);
    }

    fn handle_send_to_user(&mut self, user_id: &UserId, data: Vec<u8>) {
        let Some(&id) = self.users.get(user_id) else {
            tracing::debug!(%user_id, "no session for user, dropping");
            return;
        };
        let failed = self.deliver([id], &Frame::from(data));
        self.evict(failed);
    }

    /// Encodes `envelope` once and fans it out to `room_id`, skipping
    /// `exclude`. Members that can't take it are evicted.
    fn publish(
        &mut self,
        room_id: &RoomId,
        envelope: &Envelope,
        exclude: Option<SessionId>,
    ) {
        let frame = match self.codec.encode(envelope) {
            Ok(bytes) => Frame::from(bytes),
            Err(e) => {
                tracing::warn!(%room_id, error = %e, "failed to encode envelope");
                return;
            }
        };
        let targets = self.members_of(room_id, exclude);
        let failed = self.deliver(targets, &frame);
        self.evict(failed);
    }

    fn members_of(
        &self,
        room_id: &RoomId,
        exclude: Option<SessionId>,
    ) -> Vec<SessionId> {
        self.rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .copied()
                    .filter(|id| Some(*id) != exclude)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Non-blocking enqueue onto each target. Returns the targets that
    /// could not take the frame.
    fn deliver(
        &self,
        targets: impl IntoIterator<Item = SessionId>,
        frame: &Frame,
    ) -> Vec<SessionId> {
        let mut failed = Vec::new();
        for id in targets {
            let Some(session) = self.sessions.get(&id) else {
                continue;
            };
            if let Err(e) = session.try_deliver(frame) {
                tracing::warn!(session_id = %id, error = %e, "disconnecting unresponsive session");
                failed.push(id);
            }
        }
        failed
    }

    /// Tears down unresponsive sessions. Their `user_left` can overflow
    /// further queues, so this keeps going until nothing else fails.
    fn evict(&mut self, mut pending: Vec<SessionId>) {
        while let Some(id) = pending.pop() {
            let Some(identity) = self.remove_session(id) else {
                continue;
            };
            pending.extend(self.departure_failures(&identity));
        }
    }

    fn announce_departure(&mut self, identity: &Identity) {
        let failed = self.departure_failures(identity);
        self.evict(failed);
    }

    fn departure_failures(&self, identity: &Identity) -> Vec<SessionId> {
        let envelope = Envelope::user_left(identity);
        match self.codec.encode(&envelope) {
            Ok(bytes) => {
                let targets = self.members_of(&identity.room_id, None);
                self.deliver(targets, &Frame::from(bytes))
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode user_left");
                Vec::new()
            }
        }
    }

    /// Removes a session from all three maps, closing its queue.
    /// Returns `None` if it was not registered.
    fn remove_session(&mut self, id: SessionId) -> Option<Identity> {
        let session = self.sessions.remove(&id)?;
        let identity = session.identity().clone();
        drop(session);

        if let Entry::Occupied(mut members) =
            self.rooms.entry(identity.room_id.clone())
        {
            members.get_mut().remove(&id);
            if members.get().is_empty() {
                members.remove();
                tracing::debug!(room_id = %identity.room_id, "room emptied");
            }
        }

        // A newer session for the same user keeps its mapping.
        if self.users.get(&identity.user_id) == Some(&id) {
            self.users.remove(&identity.user_id);
        }

        Some(identity)
    }

    fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            sessions: self.sessions.len(),
            users: self.users.len(),
            rooms: self
                .rooms
                .iter()
                .map(|(room_id, members)| (room_id.clone(), members.len()))
                .collect(),
        }
    }
}

/// Spawns the hub task and returns a handle to it.
///
/// The hub runs until [`HubHandle::shutdown`] is called or every handle
/// has been dropped.
pub fn spawn_hub<C: Codec>(codec: C, config: HubConfig) -> HubHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let hub = ConnectionHub {
        codec,
        sessions: HashMap::new(),
        rooms: HashMap::new(),
        users: HashMap::new(),
        receiver: rx,
    };

    tokio::spawn(hub.run());

    HubHandle { sender: tx }
}
