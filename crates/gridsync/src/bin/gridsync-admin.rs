//! gridsync-admin: interactive console for switching the active map.

use clap::Parser;
use gridsync::config::{AdminArgs, AdminConfig};
use gridsync::{init_tracing, run_console, GridsyncError};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<(), GridsyncError> {
    let config = AdminConfig::from_args(AdminArgs::parse())?;
    init_tracing(&config.log_level);

    tracing::debug!(addr = %config.addr, "connecting");
    run_console(
        &config.addr,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}
