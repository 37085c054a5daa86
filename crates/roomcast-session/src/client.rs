//! One client's session: a reader and a writer bridging a connection to
//! the hub.
//!
//! The reader runs on the session's own task and hands every inbound
//! frame to the hub. The writer runs on a spawned task, drains the
//! outbound queue the hub fills and keeps the connection alive with
//! pings. Neither touches room state.
//!
//! Teardown always goes through the hub: the reader unregisters on its
//! way out, the hub drops the session's queue, and the writer sees the
//! queue close, sends a close frame and exits. If the writer fails first
//! it flips the state to `Closing`, which stops the reader.

use std::sync::Arc;

use roomcast_hub::{Frame, HubHandle, Outbox, SessionHandle, SessionId};
use roomcast_protocol::Identity;
use roomcast_transport::{
    Connection, ConnectionReader, ConnectionWriter, Inbound, TransportError,
};
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{SessionConfig, SessionError, SessionState};

/// A connected, authenticated client, ready to be run.
pub struct ClientSession<T: Connection> {
    conn: T,
    identity: Identity,
    hub: HubHandle,
    config: SessionConfig,
    state: Arc<watch::Sender<SessionState>>,
}

impl<T: Connection> ClientSession<T> {
    pub fn new(
        conn: T,
        identity: Identity,
        hub: HubHandle,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            conn,
            identity,
            hub,
            config,
            state: Arc::new(state),
        }
    }

    /// Watches the session's lifecycle state.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Runs the session to completion.
    ///
    /// Registers with the hub (which announces `user_joined` to the room
    /// before any input is read), then pumps frames until the first
    /// fatal condition. Returns that condition, or `Ok(())` if the
    /// client or the hub closed the session cleanly. The session is
    /// unregistered and the socket released in every case.
    pub async fn run(self) -> Result<(), SessionError> {
        let Self {
            conn,
            identity,
            hub,
            config,
            state,
        } = self;
        let conn_id = conn.id();

        let (handle, outbox) =
            SessionHandle::new(identity, config.outbound_capacity);
        let session_id = handle.id();

        if let Err(e) = hub.register(handle).await {
            mark_closing(&state);
            let (_reader, mut writer) = conn.split();
            let _ = time::timeout(config.write_timeout, writer.close()).await;
            state.send_replace(SessionState::Closed);
            return Err(e.into());
        }
        state.send_replace(SessionState::Active);
        tracing::debug!(%conn_id, %session_id, "session active");

        let (reader, writer) = conn.split();
        let writer_task = tokio::spawn(write_loop(
            writer,
            outbox,
            config.clone(),
            Arc::clone(&state),
        ));

        let read_result =
            read_loop(reader, &hub, session_id, &config, &state).await;
        mark_closing(&state);

        // Unavailable only if the hub already stopped, which has closed
        // the queue anyway.
        let _ = hub.unregister(session_id).await;

        let write_result = match writer_task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "writer task failed");
                Ok(())
            }
        };
        state.send_replace(SessionState::Closed);

        read_result.and(write_result)
    }
}

/// Moves the state to `Closing` unless it is already there or beyond.
fn mark_closing(state: &watch::Sender<SessionState>) {
    state.send_if_modified(|current| {
        if current.is_closing() {
            false
        } else {
            *current = SessionState::Closing;
            true
        }
    });
}

/// Reads until the client goes away, a fatal error, or the writer gives
/// up. Only a pong pushes the read deadline back.
async fn read_loop<R: ConnectionReader>(
    mut reader: R,
    hub: &HubHandle,
    session_id: SessionId,
    config: &SessionConfig,
    state: &watch::Sender<SessionState>,
) -> Result<(), SessionError> {
    let mut lifecycle = state.subscribe();
    let mut deadline = Instant::now() + config.read_timeout;

    loop {
        let inbound = tokio::select! {
            received = time::timeout_at(deadline, reader.recv()) => {
                match received {
                    Ok(Err(TransportError::MessageTooLarge { size, limit })) => {
                        return Err(SessionError::FrameTooLarge { size, limit });
                    }
                    Ok(inbound) => inbound?,
                    Err(_) => return Err(SessionError::ReadTimeout),
                }
            }
            _ = lifecycle.wait_for(|s| s.is_closing()) => return Ok(()),
        };

        match inbound {
            Inbound::Frame(data) => {
                if data.len() > config.max_frame_bytes {
                    return Err(SessionError::FrameTooLarge {
                        size: data.len(),
                        limit: config.max_frame_bytes,
                    });
                }
                hub.dispatch(session_id, data).await?;
            }
            Inbound::Pong => {
                deadline = Instant::now() + config.read_timeout;
            }
            Inbound::Closed => {
                tracing::debug!(%session_id, "client closed connection");
                return Ok(());
            }
        }
    }
}

/// Drains the outbound queue onto the socket and pings on a timer.
/// Sets `Closing` on the way out, whatever the reason.
async fn write_loop<W: ConnectionWriter>(
    mut writer: W,
    mut outbox: Outbox,
    config: SessionConfig,
    state: Arc<watch::Sender<SessionState>>,
) -> Result<(), SessionError> {
    let result = pump(&mut writer, &mut outbox, &config).await;
    mark_closing(&state);
    result
}

async fn pump<W: ConnectionWriter>(
    writer: &mut W,
    outbox: &mut Outbox,
    config: &SessionConfig,
) -> Result<(), SessionError> {
    let every = config.ping_interval();
    let mut keepalive = time::interval_at(Instant::now() + every, every);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbox.recv() => {
                let Some(first) = frame else {
                    // The hub dropped this session.
                    let _ = time::timeout(config.write_timeout, writer.close()).await;
                    return Ok(());
                };
                let batch = coalesce(first, outbox, config.outbound_capacity);
                time::timeout(config.write_timeout, writer.send(batch))
                    .await
                    .map_err(|_| SessionError::WriteTimeout)??;
            }
            _ = keepalive.tick() => {
                time::timeout(config.write_timeout, writer.ping())
                    .await
                    .map_err(|_| SessionError::WriteTimeout)??;
            }
        }
    }
}

/// Joins `first` and whatever else is already queued (up to `limit`
/// frames in total) into one newline-separated payload.
fn coalesce(first: Frame, outbox: &mut Outbox, limit: usize) -> Vec<u8> {
    let mut batch = first.to_vec();
    for _ in 1..limit {
        match outbox.try_recv() {
            Ok(next) => {
                batch.push(b'\n');
                batch.extend_from_slice(&next);
            }
            Err(_) => break,
        }
    }
    batch
}
