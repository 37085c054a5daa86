//! Transport abstraction layer for Roomcast.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the socket a client session runs on. A connection is split into an
//! independent [`ConnectionReader`] and [`ConnectionWriter`] so the inbound
//! and outbound flows of a session can be driven by separate tasks.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod request;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use request::ConnectRequest;
#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketConnection, WebSocketIncoming, WebSocketReader, WebSocketTransport,
    WebSocketWriter,
};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a [`ConnectionReader`] can observe on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A data frame from the peer.
    Frame(Vec<u8>),
    /// The peer acknowledged one of our keepalive pings.
    Pong,
    /// The peer closed the connection (close frame or end of stream).
    Closed,
}

/// Accepts new incoming connections.
///
/// Accepting only takes the socket off the listener. The protocol
/// handshake happens in [`Incoming::upgrade`], which the caller runs on
/// its own task so a slow peer never holds up the next accept.
pub trait Transport: Send + Sync + 'static {
    /// An accepted socket that has not been upgraded yet.
    type Incoming: Incoming;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming socket.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// An accepted socket waiting for its handshake.
pub trait Incoming: Send + 'static {
    /// The connection produced once the handshake completes.
    type Connection: Connection;

    /// Runs the handshake. Has no deadline of its own.
    fn upgrade(
        self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single accepted connection, before it is split into its two halves.
pub trait Connection: Send + 'static {
    /// The inbound half.
    type Reader: ConnectionReader;
    /// The outbound half.
    type Writer: ConnectionWriter;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// The upgrade request this connection was opened with.
    fn request(&self) -> &ConnectRequest;

    /// Splits the connection into halves that can live in separate tasks.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// The inbound half of a connection.
pub trait ConnectionReader: Send + 'static {
    /// Waits for the next thing the peer sends.
    ///
    /// Returns [`Inbound::Closed`] once the peer has gone away cleanly.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Inbound, TransportError>> + Send;
}

/// The outbound half of a connection.
pub trait ConnectionWriter: Send + 'static {
    /// Writes one data frame to the peer.
    fn send(
        &mut self,
        data: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a keepalive probe. The peer answers with [`Inbound::Pong`].
    fn ping(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a close frame and shuts the outbound half down.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}
