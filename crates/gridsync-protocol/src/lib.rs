//! Wire protocol for gridsync.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Request`], [`Response`], [`TokenSet`], [`MapId`], ...)
//!   the messages and the board data they carry.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) how messages become
//!   payload bytes.
//! - **Errors** ([`ProtocolError`]) what can go wrong decoding them.
//!
//! # Architecture
//!
//! ```text
//! Transport (framed bytes) → Protocol (Request/Response) → Store
//! ```
//!
//! Framing is the transport's job; by the time bytes reach a codec they
//! are exactly one payload.

mod codec;
mod error;
mod types;

pub use codec::{Codec, ACK, ERR, LEGACY_QUIT};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    MapId, Position, Request, Response, TokenPlacement, TokenRecord, TokenSet,
    LARGE_TOKEN_SUFFIX,
};
