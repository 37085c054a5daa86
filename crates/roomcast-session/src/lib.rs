//! Client sessions for Roomcast.
//!
//! This crate bridges one accepted connection to the hub:
//!
//! 1. **Authentication**: recovering who a caller is from the upgrade
//!    request ([`Authenticator`], [`GatewayAuthenticator`])
//! 2. **Session lifecycle**: registering with the hub, pumping frames
//!    both ways and tearing down on the first fatal error
//!    ([`ClientSession`])
//! 3. **Keepalive**: pings on a timer, with a read deadline refreshed
//!    by every pong
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)      ← accepts connections, authenticates, runs sessions
//!     ↕
//! Session (this crate) ← reader + writer per connection
//!     ↕
//! Hub / Transport (below) ← room fan-out and the socket itself
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod client;
mod error;
mod session;

pub use auth::{Authenticator, GatewayAuthenticator};
pub use client::ClientSession;
pub use error::SessionError;
pub use session::{SessionConfig, SessionState};
