//! Connection hub for Roomcast.
//!
//! The hub is a single Tokio task (actor model) that owns the session
//! registry, room membership and the user-to-session map. Everything else
//! talks to it through a [`HubHandle`].
//!
//! # Key types
//!
//! - [`spawn_hub`] starts the hub and returns its handle
//! - [`HubHandle`] sends register, dispatch and broadcast commands
//! - [`SessionHandle`] is the hub's end of one client's outbound queue
//! - [`HubSnapshot`] is a point-in-time view of the registry

mod config;
mod error;
mod hub;
mod session;

pub use config::{DEFAULT_COMMAND_BUFFER, DEFAULT_OUTBOUND_CAPACITY, HubConfig, HubSnapshot};
pub use error::HubError;
pub use hub::{HubHandle, spawn_hub};
pub use session::{Frame, Outbox, SessionHandle, SessionId};
