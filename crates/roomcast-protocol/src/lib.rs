//! Wire protocol for Roomcast.
//!
//! This crate defines what clients and the hub say to each other:
//!
//! - **Types** ([`Envelope`], [`MessageType`], [`Metadata`], [`Identity`])
//!   are the structures that travel on the wire, plus the routing rule
//!   attached to each message type ([`FanOut`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) is how envelopes become
//!   frames and back.
//! - **Errors** ([`ProtocolError`]) cover everything that can be wrong
//!   with a single payload.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Hub (rooms, fan-out)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Envelope, FanOut, Identity, MessageType, Metadata, RoomId, UserId,
};
