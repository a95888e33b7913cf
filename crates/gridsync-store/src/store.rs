//! The state store: the active map and every token placed on it.
//!
//! # Concurrency note
//!
//! All state lives behind one `std::sync::Mutex`. Operations are tiny
//! (a map lookup, an insert, a clear) and never await while holding the
//! lock, so a blocking mutex is fine even inside async tasks. One lock
//! for everything also gives the key guarantee for free: `set_map`
//! replaces the map and clears the tokens in a single critical section,
//! so no `place_token` can land "between" the two and leave a token from
//! the old map on the new one.

use std::sync::{Mutex, MutexGuard, PoisonError};

use gridsync_protocol::{MapId, Position, Request, Response, TokenRecord, TokenSet};

/// Everything the lock protects.
#[derive(Debug)]
struct Board {
    map: MapId,
    tokens: TokenSet,
}

/// The server's authoritative map and token state.
///
/// Constructed once at startup and shared (behind an `Arc`) by every
/// connection.
#[derive(Debug)]
pub struct StateStore {
    board: Mutex<Board>,
}

impl StateStore {
    /// Creates a store with `map` active and no tokens.
    pub fn new(map: MapId) -> Self {
        Self {
            board: Mutex::new(Board {
                map,
                tokens: TokenSet::new(),
            }),
        }
    }

    /// Locks the board.
    ///
    /// A panic while holding the lock cannot leave the board half-updated:
    /// each mutation is one assignment or one `clear` on values that are
    /// valid at every step. So a poisoned lock is simply recovered.
    fn lock(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the active map.
    pub fn get_map(&self) -> MapId {
        self.lock().map.clone()
    }

    /// Returns a copy of every token.
    pub fn get_tokens(&self) -> TokenSet {
        self.lock().tokens.clone()
    }

    /// Returns the active map and its tokens as one consistent pair.
    pub fn snapshot(&self) -> (MapId, TokenSet) {
        let board = self.lock();
        (board.map.clone(), board.tokens.clone())
    }

    /// Creates or overwrites a token. Last write wins.
    ///
    /// Positions are not checked against the map: keeping tokens on the
    /// board is the client's job.
    pub fn place_token(
        &self,
        name: impl Into<String>,
        position: Option<Position>,
        image: impl Into<String>,
    ) {
        let name = name.into();
        let record = TokenRecord::new(position, image);
        tracing::trace!(token = %name, ?position, image = %record.image, "placing token");
        self.lock().tokens.insert(name, record);
    }

    /// Makes `map` active and removes every token.
    pub fn set_map(&self, map: MapId) {
        let mut board = self.lock();
        tracing::info!(from = %board.map, to = %map, cleared = board.tokens.len(), "switching map");
        board.map = map;
        board.tokens = TokenSet::new();
    }

    /// Applies one request and returns the response to send back.
    ///
    /// `Close` only matters to the connection; it is acknowledged here
    /// without touching the board.
    pub fn apply(&self, request: &Request) -> Response {
        match request {
            Request::GetMap => Response::Map(self.get_map()),
            Request::GetTokens => Response::Tokens(self.get_tokens()),
            Request::PlaceToken(placement) => {
                self.place_token(
                    placement.name.clone(),
                    placement.position,
                    placement.image.clone(),
                );
                Response::Ack
            }
            Request::SetMap { identifier } => {
                self.set_map(identifier.clone());
                Response::Ack
            }
            Request::Close => Response::Ack,
        }
    }
}
