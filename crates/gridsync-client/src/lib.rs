//! Client side of gridsync.
//!
//! - [`ClientSession`]: one persistent connection, one request at a time.
//!   Used by the admin tool and the map viewer.
//! - [`BoardMirror`]: the viewer's cached copy of the board, refreshed
//!   every few frames.
//!
//! Nothing here retries. A [`ClientError::Transport`] means the
//! connection is gone and the caller decides whether to reconnect, keep
//! drawing stale state, or give up.

mod error;
mod mirror;
mod session;

pub use error::ClientError;
pub use mirror::{BoardMirror, SyncOutcome};
pub use session::{Acknowledgement, ClientSession};
