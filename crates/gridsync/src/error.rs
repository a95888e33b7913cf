//! Unified error type for gridsync.

use gridsync_client::ClientError;
use gridsync_protocol::ProtocolError;
use gridsync_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates a `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GridsyncError {
    /// A transport-level error (bind, accept, framing, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, malformed payload, unknown op).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A client session error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local I/O, e.g. reading admin commands from stdin.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
