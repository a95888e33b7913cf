//! Authoritative map and token state for gridsync.
//!
//! The server owns exactly one [`StateStore`]. Every connection handler
//! reads and mutates it through a shared reference; clients only ever see
//! copies.
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection handler (above)  ← decodes requests, calls `apply`
//!     ↕
//! Store (this crate)  ← the single source of truth
//!     ↕
//! Protocol (below)  ← MapId, TokenSet, Request, Response
//! ```

mod store;

pub use store::StateStore;
