//! `RoomcastServer` builder and accept loop.
//!
//! This is the entry point for running a Roomcast hub. It ties the layers
//! together: transport → session → hub.

use std::future::Future;
use std::sync::Arc;

use roomcast_hub::{HubConfig, HubHandle, spawn_hub};
use roomcast_protocol::JsonCodec;
use roomcast_session::{Authenticator, SessionConfig};
use roomcast_transport::{Connection, Incoming, Transport, WebSocketTransport};

use crate::RoomcastError;
use crate::handler::handle_connection;

/// Shared state handed to each connection task.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) auth: A,
    pub(crate) hub: HubHandle,
    pub(crate) session_config: SessionConfig,
}

/// Builder for configuring and starting a Roomcast server.
///
/// # Example
///
/// ```rust,ignore
/// use roomcast::prelude::*;
///
/// let server = RoomcastServer::builder()
///     .bind("0.0.0.0:8080")
///     .session_config(SessionConfig::default())
///     .build(GatewayAuthenticator)
///     .await?;
/// server.run().await
/// ```
pub struct RoomcastServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    hub_config: HubConfig,
}

impl RoomcastServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            hub_config: HubConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the timeouts and limits applied to every client session.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.hub_config = config;
        self
    }

    /// Binds the listener and starts the hub.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`, with the transport's
    /// message limit set to the session's `max_frame_bytes`.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<RoomcastServer<A>, RoomcastError> {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_max_message_size(self.session_config.max_frame_bytes);
        let hub = spawn_hub(JsonCodec, self.hub_config);

        let state = Arc::new(ServerState {
            auth,
            hub,
            session_config: self.session_config,
        });

        Ok(RoomcastServer { transport, state })
    }
}

impl Default for RoomcastServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Roomcast server with its hub running.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct RoomcastServer<A: Authenticator> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A>>,
}

impl<A: Authenticator> RoomcastServer<A> {
    /// Creates a new builder.
    pub fn builder() -> RoomcastServerBuilder {
        RoomcastServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the hub, for server-side broadcasts, direct messages
    /// and snapshots.
    pub fn hub(&self) -> HubHandle {
        self.state.hub.clone()
    }

    /// Accepts connections until the process is terminated.
    pub async fn run(self) -> Result<(), RoomcastError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `signal` resolves, then stops the hub,
    /// which closes every session with a close frame.
    pub async fn run_until(
        mut self,
        signal: impl Future<Output = ()>,
    ) -> Result<(), RoomcastError> {
        tokio::pin!(signal);
        tracing::info!(addr = ?self.local_addr().ok(), "Roomcast server running");

        loop {
            tokio::select! {
                _ = &mut signal => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(serve(incoming, state));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("Roomcast server shutting down");
        self.transport.shutdown().await?;
        if self.state.hub.shutdown().await.is_err() {
            tracing::debug!("hub already stopped");
        }
        Ok(())
    }
}

/// Upgrades one accepted socket and runs it to completion. A peer that
/// doesn't finish the handshake within `handshake_timeout` is dropped.
async fn serve<I, A>(incoming: I, state: Arc<ServerState<A>>)
where
    I: Incoming,
    A: Authenticator,
{
    let deadline = state.session_config.handshake_timeout;
    let conn = match tokio::time::timeout(deadline, incoming.upgrade()).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "handshake failed");
            return;
        }
        Err(_) => {
            tracing::debug!(?deadline, "handshake timed out");
            return;
        }
    };

    let conn_id = conn.id();
    if let Err(e) = handle_connection(conn, state).await {
        tracing::debug!(%conn_id, error = %e, "connection ended with error");
    }
}
