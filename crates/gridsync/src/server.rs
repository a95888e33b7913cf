//! `SyncServer` builder and accept loop.
//!
//! This is the entry point for running a map server. It ties together the
//! layers: transport → protocol → store.

use std::sync::Arc;
use std::time::Duration;

use gridsync_protocol::{Codec, JsonCodec, MapId};
use gridsync_store::StateStore;
use gridsync_transport::{Connection, TcpTransport, Transport};

use crate::handler::handle_connection;
use crate::GridsyncError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The store
/// does its own locking.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) store: Arc<StateStore>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a map server.
///
/// # Example
///
/// ```rust,no_run
/// use gridsync::prelude::*;
///
/// # async fn start() -> Result<(), GridsyncError> {
/// let server = SyncServer::builder()
///     .bind("0.0.0.0:65432")
///     .initial_map(MapId::new("default.csv"))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct SyncServerBuilder {
    bind_addr: String,
    initial_map: MapId,
    idle_timeout: Option<Duration>,
}

impl SyncServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:65432".to_string(),
            initial_map: MapId::new("default.csv"),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the map that is active when the server starts.
    pub fn initial_map(mut self, map: MapId) -> Self {
        self.initial_map = map;
        self
    }

    /// Sets how long a connection may wait between requests.
    /// `None` disables the timeout.
    pub fn idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Binds the listener and creates the store.
    pub async fn build(self) -> Result<SyncServer, GridsyncError> {
        let transport = TcpTransport::bind(&self.bind_addr)
            .await?
            .with_idle_timeout(self.idle_timeout);

        tracing::info!(map = %self.initial_map, "initial map");
        let state = Arc::new(ServerState {
            store: Arc::new(StateStore::new(self.initial_map)),
            codec: JsonCodec,
        });

        Ok(SyncServer { transport, state })
    }
}

impl Default for SyncServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A map server bound to its address.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SyncServer {
    transport: TcpTransport,
    state: Arc<ServerState<JsonCodec>>,
}

impl SyncServer {
    /// Creates a new builder.
    pub fn builder() -> SyncServerBuilder {
        SyncServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle to the authoritative store.
    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.state.store)
    }

    /// Runs the accept loop.
    ///
    /// Spawns one handler task per connection, all sharing the same
    /// store. A failing connection is logged and forgotten; a failing
    /// `accept` is logged and retried. Runs until the task is dropped.
    pub async fn run(mut self) -> Result<(), GridsyncError> {
        tracing::info!("gridsync server running");

        let mut backoff = AcceptBackoff::default();
        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    backoff.reset();
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let conn_id = conn.id();
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                %conn_id,
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    // Usually out of file descriptors; retrying at once
                    // would only spin.
                    let delay = backoff.next_delay();
                    tracing::error!(error = %e, ?delay, "accept failed");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Delay between failed `accept` calls: doubles from 10 ms up to 1 s and
/// starts over after the next successful accept.
#[derive(Debug, Default)]
struct AcceptBackoff {
    failures: u32,
}

impl AcceptBackoff {
    const FIRST: Duration = Duration::from_millis(10);
    const MAX: Duration = Duration::from_secs(1);

    fn next_delay(&mut self) -> Duration {
        let delay = Self::FIRST
            .saturating_mul(1 << self.failures.min(16))
            .min(Self::MAX);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_backoff_doubles_up_to_max() {
        let mut backoff = AcceptBackoff::default();
        let delays: Vec<_> = (0..10).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays[0], Duration::from_millis(10));
        assert_eq!(delays[1], Duration::from_millis(20));
        assert_eq!(delays[2], Duration::from_millis(40));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(delays[9], AcceptBackoff::MAX);
        assert_eq!(backoff.next_delay(), AcceptBackoff::MAX);
    }

    #[test]
    fn test_accept_backoff_reset() {
        let mut backoff = AcceptBackoff::default();
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }
}
