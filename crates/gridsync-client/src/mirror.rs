//! The map viewer's local copy of the board.
//!
//! The viewer redraws every frame but only asks the server for fresh
//! state every `refresh_period` frames. Between refreshes it draws from
//! this mirror, which may be a little stale; it is never authoritative.

use gridsync_protocol::{MapId, Position, TokenRecord, TokenSet};

use crate::{Acknowledgement, ClientError, ClientSession};

/// What a frame tick or refresh did to the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Not a refresh frame; nothing was fetched.
    Skipped,
    /// Map and tokens were fetched; the map is unchanged.
    Refreshed,
    /// The server switched maps; the viewer should load the new grid.
    MapChanged(MapId),
}

/// A periodically refreshed snapshot of the server's board.
#[derive(Debug)]
pub struct BoardMirror {
    refresh_period: u32,
    frames_since_refresh: u32,
    map: Option<MapId>,
    tokens: TokenSet,
}

impl BoardMirror {
    /// Creates an empty mirror that refreshes every `refresh_period`
    /// frames. A period of 0 refreshes every frame.
    pub fn new(refresh_period: u32) -> Self {
        Self {
            refresh_period: refresh_period.max(1),
            frames_since_refresh: 0,
            map: None,
            tokens: TokenSet::new(),
        }
    }

    /// The last map identifier fetched, if any.
    pub fn map(&self) -> Option<&MapId> {
        self.map.as_ref()
    }

    /// The last token snapshot fetched.
    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    /// Finds the cached token covering `cell`.
    pub fn token_at(&self, cell: Position) -> Option<(&str, &TokenRecord)> {
        self.tokens.token_at(cell)
    }

    /// Call once per rendered frame. Refreshes when the period is up.
    pub async fn on_frame(
        &mut self,
        session: &mut ClientSession,
    ) -> Result<SyncOutcome, ClientError> {
        self.frames_since_refresh += 1;
        if self.frames_since_refresh < self.refresh_period {
            return Ok(SyncOutcome::Skipped);
        }
        self.sync(session).await
    }

    /// Fetches the map and tokens right now.
    ///
    /// A token payload that cannot be decoded is logged and the previous
    /// snapshot is kept, so the viewer keeps drawing something sensible.
    /// After a map change there is no previous snapshot to keep, and the
    /// mirror shows an empty board until a fetch succeeds.
    /// Connection errors are returned.
    pub async fn sync(
        &mut self,
        session: &mut ClientSession,
    ) -> Result<SyncOutcome, ClientError> {
        self.frames_since_refresh = 0;

        let map = session.fetch_map().await?;
        let changed = self.map.as_ref() != Some(&map);
        if changed {
            tracing::info!(%map, "active map changed");
            self.map = Some(map.clone());
            // Tokens belong to a map; the old ones never carry over.
            self.tokens = TokenSet::new();
        }

        match session.fetch_tokens().await {
            Ok(tokens) => self.tokens = tokens,
            Err(ClientError::Protocol(e)) => {
                tracing::warn!(error = %e, "failed to parse tokens, keeping last snapshot");
            }
            Err(e) => return Err(e),
        }

        Ok(if changed {
            SyncOutcome::MapChanged(map)
        } else {
            SyncOutcome::Refreshed
        })
    }

    /// Moves a token the mirror already knows about, keeping its image.
    ///
    /// On `ack` the local copy is updated straight away so the viewer
    /// does not wait for the next refresh to show the move.
    pub async fn move_token(
        &mut self,
        session: &mut ClientSession,
        name: &str,
        position: Option<Position>,
    ) -> Result<Acknowledgement, ClientError> {
        let image = self
            .tokens
            .get(name)
            .map(|record| record.image.clone())
            .ok_or_else(|| ClientError::UnknownToken(name.to_string()))?;

        let ack = session
            .push_token_move(name, position, image.clone())
            .await?;
        if ack.is_accepted() {
            self.tokens.insert(name, TokenRecord::new(position, image));
        }
        Ok(ack)
    }
}
