//! Per-connection handler: read a request, apply it, answer, repeat.
//!
//! Each accepted connection gets its own Tokio task running this loop:
//!
//! ```text
//! AwaitingRequest → Decoding → Dispatching → Responding → AwaitingRequest
//!        │                                        │
//!        └──── end of stream / timeout ───┐       └── Close request
//!                                          ▼              ▼
//!                                        Closed ◄─────────┘
//! ```
//!
//! A bad payload costs the client one `err` response, never the
//! connection. Only transport failures end the loop early, and they only
//! ever end *this* connection.

use std::sync::Arc;

use gridsync_protocol::{Codec, Request, Response};
use gridsync_transport::{Connection, TcpConnection, TransportError};

use crate::server::ServerState;
use crate::GridsyncError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: TcpConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), GridsyncError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    loop {
        // --- AwaitingRequest ---
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed by peer");
                break;
            }
            Err(TransportError::Framing(prefix)) => {
                // Without a valid length we cannot find the next frame.
                tracing::warn!(%conn_id, %prefix, "bad length prefix, closing");
                if let Err(e) = send_response(&conn, &state.codec, &Response::Err).await {
                    tracing::debug!(%conn_id, error = %e, "could not report framing error");
                }
                break;
            }
            Err(TransportError::TimedOut(idle)) => {
                tracing::info!(%conn_id, ?idle, "connection idle, closing");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        // --- Decoding ---
        let request = match state.codec.decode_request(&data) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "rejecting request");
                send_response(&conn, &state.codec, &Response::Err).await?;
                continue;
            }
        };

        // --- Dispatching ---
        if request.is_admin() {
            tracing::info!(%conn_id, ?request, "admin request");
        } else {
            tracing::trace!(%conn_id, op = request.op(), arg = request.arg(), "request");
        }
        let response = state.store.apply(&request);

        // --- Responding ---
        send_response(&conn, &state.codec, &response).await?;

        if request == Request::Close {
            tracing::debug!(%conn_id, "client asked to close");
            break;
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    Ok(())
}

/// Encodes and sends one response frame.
async fn send_response(
    conn: &TcpConnection,
    codec: &impl Codec,
    response: &Response,
) -> Result<(), GridsyncError> {
    let bytes = codec.encode_response(response)?;
    conn.send(&bytes).await?;
    Ok(())
}
