//! # Roomcast
//!
//! Real-time chat connection hub.
//!
//! Clients connect over WebSockets, already vetted by an upstream gateway
//! that decided which room they may enter. Roomcast keeps each connection
//! alive, announces arrivals and departures, and fans every message out
//! to the sender's room. Nothing is persisted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::prelude::*;
//!
//! # async fn start() -> Result<(), RoomcastError> {
//! let server = RoomcastServer::<GatewayAuthenticator>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(GatewayAuthenticator)
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::RoomcastError;
pub use server::{RoomcastServer, RoomcastServerBuilder};

pub mod prelude {
    pub use crate::{RoomcastError, RoomcastServer, RoomcastServerBuilder};
    pub use roomcast_hub::{HubConfig, HubHandle, HubSnapshot};
    pub use roomcast_protocol::{
        Envelope, Identity, MessageType, Metadata, RoomId, UserId,
    };
    pub use roomcast_session::{
        Authenticator, GatewayAuthenticator, SessionConfig, SessionError,
    };
    pub use roomcast_transport::ConnectRequest;
}
