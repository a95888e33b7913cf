//! gridsync-server: serves the active map and token positions.
//!
//! ```text
//! gridsync-server default.csv --port 65432
//! ```

use clap::Parser;
use gridsync::config::{ServerArgs, ServerConfig};
use gridsync::{init_tracing, GridsyncError, SyncServer};

#[tokio::main]
async fn main() -> Result<(), GridsyncError> {
    let config = ServerConfig::from_args(ServerArgs::parse())?;
    init_tracing(&config.log_level);

    tracing::info!(
        addr = %config.addr,
        map = %config.map,
        idle_timeout = ?config.idle_timeout,
        "starting gridsync server"
    );

    let server = SyncServer::builder()
        .bind(&config.addr)
        .initial_map(config.map)
        .idle_timeout(config.idle_timeout)
        .build()
        .await?;

    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening");
    }

    tokio::select! {
        result = server.run() => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
