//! Per-connection handler: authenticate, then run the client session.

use std::sync::Arc;
use std::time::Duration;

use roomcast_session::{Authenticator, ClientSession};
use roomcast_transport::{Connection, ConnectionWriter};

use crate::RoomcastError;
use crate::server::ServerState;

/// How long a rejected client gets to receive its close frame.
const REJECT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handles a single connection from accept to close.
///
/// A request that doesn't authenticate is closed without ever reaching
/// the hub.
pub(crate) async fn handle_connection<C, A>(
    conn: C,
    state: Arc<ServerState<A>>,
) -> Result<(), RoomcastError>
where
    C: Connection,
    A: Authenticator,
{
    let conn_id = conn.id();

    let identity = match state.auth.authenticate(conn.request()).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "rejecting connection");
            let (_reader, mut writer) = conn.split();
            let _ = tokio::time::timeout(REJECT_CLOSE_TIMEOUT, writer.close()).await;
            return Err(e.into());
        }
    };

    tracing::debug!(
        %conn_id,
        room_id = %identity.room_id,
        user_id = %identity.user_id,
        "connection authenticated"
    );

    let session = ClientSession::new(
        conn,
        identity,
        state.hub.clone(),
        state.session_config.clone(),
    );
    session.run().await?;

    tracing::debug!(%conn_id, "connection closed cleanly");
    Ok(())
}
