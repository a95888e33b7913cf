//! # Gridsync
//!
//! Keeps every map viewer at a tabletop session looking at the same map,
//! with the same tokens in the same cells.
//!
//! One authoritative server holds the active map and the token positions.
//! Viewers poll it and push their own moves; an admin console switches the
//! map for everyone. Everything travels as length-prefixed JSON frames over
//! plain TCP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridsync::prelude::*;
//!
//! # async fn start() -> Result<(), GridsyncError> {
//! let server = SyncServer::builder()
//!     .bind("127.0.0.1:65432")
//!     .initial_map(MapId::new("default.csv"))
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! The `gridsync-server` and `gridsync-admin` binaries wrap this crate
//! with [`config`] and [`init_tracing`].

mod admin;
pub mod config;
mod error;
mod handler;
mod server;

pub use admin::{run_console, AdminCommand};
pub use error::GridsyncError;
pub use server::{SyncServer, SyncServerBuilder};

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `level` when it is set. Output goes to stderr so
/// the admin console keeps stdout to itself.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Commonly used types, re-exported for convenience.
pub mod prelude {
    pub use crate::{AdminCommand, GridsyncError, SyncServer, SyncServerBuilder};
    pub use gridsync_client::{
        Acknowledgement, BoardMirror, ClientError, ClientSession, SyncOutcome,
    };
    pub use gridsync_protocol::{
        Codec, JsonCodec, MapId, Position, Request, Response, TokenPlacement, TokenRecord,
        TokenSet,
    };
    pub use gridsync_store::StateStore;
}
