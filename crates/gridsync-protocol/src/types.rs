//! Core protocol types: the map and token data that travels on the wire,
//! and the requests and responses that carry it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MapId
// ---------------------------------------------------------------------------

/// Names the map file that is currently active.
///
/// The server never opens the file; the identifier is opaque to the
/// protocol and only the rendering client knows how to load it.
///
/// `#[serde(transparent)]` makes `MapId("default.csv")` serialize as the
/// bare string `"default.csv"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub String);

impl MapId {
    /// Creates a map identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MapId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell on the map grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: u32,
    pub col: u32,
}

impl Position {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Combines the nullable `row`/`col` pair of the wire format.
///
/// Both present means placed, both null means unplaced. Anything else is
/// rejected rather than guessed at.
fn position_from_wire(
    row: Option<u32>,
    col: Option<u32>,
) -> Result<Option<Position>, String> {
    match (row, col) {
        (Some(row), Some(col)) => Ok(Some(Position { row, col })),
        (None, None) => Ok(None),
        (row, col) => Err(format!(
            "row and col must both be set or both be null, got row={row:?} col={col:?}"
        )),
    }
}

// ---------------------------------------------------------------------------
// TokenRecord
// ---------------------------------------------------------------------------

/// Image-name suffix marking a token that covers 2×2 cells.
pub const LARGE_TOKEN_SUFFIX: &str = "2x";

/// One marker on the board.
///
/// On the wire a record is `{"row": 2, "col": 3, "img": "knight"}`. An
/// unplaced token keeps its entry with `"row": null, "col": null`.
///
/// The `try_from`/`into` attributes route serde through [`TokenWire`],
/// which mirrors the JSON exactly; the conversion is where the
/// "both or neither" rule for `row`/`col` is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TokenWire", into = "TokenWire")]
pub struct TokenRecord {
    /// Top-left cell of the token, or `None` if it is off the board.
    pub position: Option<Position>,
    /// Name of the image the client draws for this token.
    pub image: String,
}

impl TokenRecord {
    pub fn new(position: Option<Position>, image: impl Into<String>) -> Self {
        Self {
            position,
            image: image.into(),
        }
    }

    /// Side length, in cells, of the square the token covers.
    pub fn footprint(&self) -> u32 {
        if self.image.ends_with(LARGE_TOKEN_SUFFIX) {
            2
        } else {
            1
        }
    }

    /// Returns `true` if the token is placed and covers `cell`.
    pub fn covers(&self, cell: Position) -> bool {
        let Some(origin) = self.position else {
            return false;
        };
        let size = self.footprint();
        (origin.row..origin.row.saturating_add(size)).contains(&cell.row)
            && (origin.col..origin.col.saturating_add(size)).contains(&cell.col)
    }
}

#[derive(Serialize, Deserialize)]
struct TokenWire {
    row: Option<u32>,
    col: Option<u32>,
    img: String,
}

impl TryFrom<TokenWire> for TokenRecord {
    type Error = String;

    fn try_from(wire: TokenWire) -> Result<Self, Self::Error> {
        Ok(Self {
            position: position_from_wire(wire.row, wire.col)?,
            image: wire.img,
        })
    }
}

impl From<TokenRecord> for TokenWire {
    fn from(record: TokenRecord) -> Self {
        Self {
            row: record.position.map(|p| p.row),
            col: record.position.map(|p| p.col),
            img: record.image,
        }
    }
}

// ---------------------------------------------------------------------------
// TokenSet
// ---------------------------------------------------------------------------

/// Every token on the current map, keyed by unique name.
///
/// Serializes as a JSON object `{name: record, ...}`. A `BTreeMap` keeps
/// the encoding deterministic; the order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSet(pub BTreeMap<String, TokenRecord>);

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a token.
    pub fn insert(&mut self, name: impl Into<String>, record: TokenRecord) {
        self.0.insert(name.into(), record);
    }

    pub fn get(&self, name: &str) -> Option<&TokenRecord> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenRecord)> {
        self.0.iter().map(|(name, record)| (name.as_str(), record))
    }

    /// Finds a token covering `cell`, taking 2×2 tokens into account.
    ///
    /// If several tokens overlap, the one with the smallest name wins.
    pub fn token_at(&self, cell: Position) -> Option<(&str, &TokenRecord)> {
        self.iter().find(|(_, record)| record.covers(cell))
    }
}

impl FromIterator<(String, TokenRecord)> for TokenSet {
    fn from_iter<I: IntoIterator<Item = (String, TokenRecord)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// The `data` of a `set`/`place_token` request.
///
/// Wire form: `{"name": "Hero", "row": 0, "col": 0, "img": "black_circle"}`.
/// Extra keys are ignored, so a client may send back a whole cached
/// record with `name` added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PlacementWire", into = "PlacementWire")]
pub struct TokenPlacement {
    pub name: String,
    pub position: Option<Position>,
    pub image: String,
}

impl TokenPlacement {
    /// Splits the placement into the token name and its stored record.
    pub fn into_record(self) -> (String, TokenRecord) {
        (
            self.name,
            TokenRecord {
                position: self.position,
                image: self.image,
            },
        )
    }
}

#[derive(Serialize, Deserialize)]
struct PlacementWire {
    name: String,
    row: Option<u32>,
    col: Option<u32>,
    img: String,
}

impl TryFrom<PlacementWire> for TokenPlacement {
    type Error = String;

    fn try_from(wire: PlacementWire) -> Result<Self, Self::Error> {
        Ok(Self {
            name: wire.name,
            position: position_from_wire(wire.row, wire.col)?,
            image: wire.img,
        })
    }
}

impl From<TokenPlacement> for PlacementWire {
    fn from(p: TokenPlacement) -> Self {
        Self {
            name: p.name,
            row: p.position.map(|pos| pos.row),
            col: p.position.map(|pos| pos.col),
            img: p.image,
        }
    }
}

/// A client request.
///
/// On the wire every request is `{"op": ..., "arg": ..., "data"?: ...}`.
/// Here each `op`/`arg` pair is its own variant, so the server's dispatch
/// is an exhaustive `match`: adding a variant is a compile error until
/// every handler deals with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `get`/`map`: which map is active?
    GetMap,
    /// `get`/`tokens`: every token on the active map.
    GetTokens,
    /// `set`/`place_token`: create or move a token.
    PlaceToken(TokenPlacement),
    /// `admin`/`set_map`: switch maps, wiping all tokens.
    SetMap { identifier: MapId },
    /// `session`/`close`: end the connection after this exchange.
    Close,
}

impl Request {
    /// The `op` field this request is sent with.
    pub fn op(&self) -> &'static str {
        match self {
            Self::GetMap | Self::GetTokens => "get",
            Self::PlaceToken(_) => "set",
            Self::SetMap { .. } => "admin",
            Self::Close => "session",
        }
    }

    /// The `arg` field this request is sent with.
    pub fn arg(&self) -> &'static str {
        match self {
            Self::GetMap => "map",
            Self::GetTokens => "tokens",
            Self::PlaceToken(_) => "place_token",
            Self::SetMap { .. } => "set_map",
            Self::Close => "close",
        }
    }

    /// Returns `true` for privileged (admin) operations.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::SetMap { .. })
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A server response.
///
/// `Ack` and `Err` travel as the bare words `ack` and `err` (not JSON
/// strings); values travel as JSON. The two never collide because a
/// map identifier is always a *quoted* JSON string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The operation succeeded.
    Ack,
    /// The request was malformed or named an unknown operation.
    Err,
    /// Answer to [`Request::GetMap`].
    Map(MapId),
    /// Answer to [`Request::GetTokens`].
    Tokens(TokenSet),
}
