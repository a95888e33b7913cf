//! The admin console: a line-oriented tool for switching maps.
//!
//! ```text
//! > map cave.csv      switch every viewer to cave.csv (clears tokens)
//! > quit              leave (also: exit)
//! ```

use gridsync_client::{Acknowledgement, ClientSession};
use gridsync_protocol::MapId;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::GridsyncError;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `map <name>`: the name is everything after the first whitespace.
    SetMap(MapId),
    /// `quit` or `exit`.
    Quit,
    /// Blank line.
    Empty,
    /// Anything else, kept for the error message.
    Unknown(String),
}

impl AdminCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        match line.split_once(char::is_whitespace) {
            Some(("map", name)) if !name.trim().is_empty() => {
                Self::SetMap(MapId::new(name.trim()))
            }
            None if line == "quit" || line == "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

const USAGE: &str = "commands: map <name>, quit";

/// Runs the console until `quit`/`exit` or end of input.
///
/// Connects to `addr` up front so a wrong address fails immediately. If
/// the connection drops later, the next command reconnects.
pub async fn run_console<R, W>(addr: &str, input: R, mut output: W) -> Result<(), GridsyncError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = Some(ClientSession::connect(addr).await?);
    output.write_all(b"connected to server\n").await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match AdminCommand::parse(&line) {
            AdminCommand::Empty => {}
            AdminCommand::Quit => break,
            AdminCommand::Unknown(cmd) => {
                output
                    .write_all(format!("unknown command {cmd:?} ({USAGE})\n").as_bytes())
                    .await?;
            }
            AdminCommand::SetMap(map) => {
                output
                    .write_all(format!("changing map to {map}\n").as_bytes())
                    .await?;

                let mut active = match session.take() {
                    Some(active) => active,
                    None => match ClientSession::connect(addr).await {
                        Ok(active) => active,
                        Err(e) => {
                            output
                                .write_all(format!("cannot reach server: {e}\n").as_bytes())
                                .await?;
                            continue;
                        }
                    },
                };

                match active.push_admin_set_map(map).await {
                    Ok(Acknowledgement::Accepted) => session = Some(active),
                    Ok(Acknowledgement::Rejected) => {
                        output
                            .write_all(b"Update not acknowledged by server\n")
                            .await?;
                        session = Some(active);
                    }
                    Err(e) if e.is_connection_lost() => {
                        // Dropping `active` here; the next command reconnects.
                        tracing::warn!(error = %e, "lost connection to server");
                        output
                            .write_all(format!("connection lost: {e}\n").as_bytes())
                            .await?;
                    }
                    Err(e) => {
                        output
                            .write_all(
                                format!("Update not acknowledged by server: {e}\n").as_bytes(),
                            )
                            .await?;
                        session = Some(active);
                    }
                }
            }
        }
    }

    if let Some(session) = session {
        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "close failed");
        }
    }
    output.flush().await?;
    Ok(())
}
