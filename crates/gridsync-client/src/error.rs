//! Error types for the client side.

use gridsync_protocol::{ProtocolError, Response};
use gridsync_transport::TransportError;

/// Errors a [`ClientSession`](crate::ClientSession) call can return.
///
/// A `Transport` error means the connection is gone: the session should
/// be dropped. The other variants leave the connection usable.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Sending or receiving failed, or the server hung up.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response arrived but could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The response decoded fine but does not answer the request,
    /// e.g. `err` to a `get map`.
    #[error("unexpected response to {request}: {response:?}")]
    UnexpectedResponse {
        request: &'static str,
        response: Response,
    },

    /// A move named a token the local mirror has never seen.
    #[error("no token named {0:?} in the local snapshot")]
    UnknownToken(String),
}

impl ClientError {
    /// Returns `true` if the connection can no longer be used.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_fatal())
    }
}
