//! One persistent connection to the map server.
//!
//! Every call is a single round trip: send one request, wait for its
//! response. Methods take `&mut self`, so the borrow checker guarantees
//! a session never has two requests in flight.

use gridsync_protocol::{
    Codec, JsonCodec, MapId, Position, Request, Response, TokenPlacement, TokenSet,
};
use gridsync_transport::{Connection, TcpConnection};

use crate::ClientError;

/// Outcome of a push: did the server accept the change?
///
/// A rejection is not an error at the connection level; the caller
/// decides what to do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Acknowledgement {
    /// The server answered `ack`.
    Accepted,
    /// The server answered `err`.
    Rejected,
}

impl Acknowledgement {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// A client connection used by the admin tool and the map viewer.
pub struct ClientSession {
    conn: TcpConnection,
    codec: JsonCodec,
}

impl ClientSession {
    /// Connects to the server at `addr` (`host:port`).
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let conn = TcpConnection::connect(addr).await?;
        tracing::info!(%addr, id = %conn.id(), "connected to map server");
        Ok(Self {
            conn,
            codec: JsonCodec,
        })
    }

    /// Asks which map is active.
    pub async fn fetch_map(&mut self) -> Result<MapId, ClientError> {
        match self.round_trip(&Request::GetMap).await? {
            Response::Map(map) => Ok(map),
            response => Err(ClientError::UnexpectedResponse {
                request: "get map",
                response,
            }),
        }
    }

    /// Fetches every token on the active map.
    pub async fn fetch_tokens(&mut self) -> Result<TokenSet, ClientError> {
        match self.round_trip(&Request::GetTokens).await? {
            Response::Tokens(tokens) => Ok(tokens),
            response => Err(ClientError::UnexpectedResponse {
                request: "get tokens",
                response,
            }),
        }
    }

    /// Places (or moves, or with `None` takes off the board) a token.
    pub async fn push_token_move(
        &mut self,
        name: impl Into<String>,
        position: Option<Position>,
        image: impl Into<String>,
    ) -> Result<Acknowledgement, ClientError> {
        let request = Request::PlaceToken(TokenPlacement {
            name: name.into(),
            position,
            image: image.into(),
        });
        let response = self.round_trip(&request).await?;
        let ack = expect_ack("place token", response)?;
        if !ack.is_accepted() {
            tracing::warn!("move not acknowledged by server");
        }
        Ok(ack)
    }

    /// Switches the server to another map, clearing all tokens.
    pub async fn push_admin_set_map(
        &mut self,
        identifier: MapId,
    ) -> Result<Acknowledgement, ClientError> {
        let response = self
            .round_trip(&Request::SetMap { identifier })
            .await?;
        let ack = expect_ack("set map", response)?;
        if !ack.is_accepted() {
            tracing::warn!("update not acknowledged by server");
        }
        Ok(ack)
    }

    /// Tells the server we are done and shuts the socket.
    pub async fn close(self) -> Result<(), ClientError> {
        let response = self.round_trip(&Request::Close).await?;
        if response != Response::Ack {
            tracing::debug!(?response, "close not acknowledged");
        }
        self.conn.close().await?;
        Ok(())
    }

    /// Sends one request and waits for its response.
    async fn round_trip(&self, request: &Request) -> Result<Response, ClientError> {
        let bytes = self.codec.encode_request(request)?;
        self.conn.send(&bytes).await?;

        let Some(reply) = self.conn.recv().await? else {
            return Err(gridsync_transport::TransportError::ConnectionClosed(
                "server closed the connection before responding".into(),
            )
            .into());
        };
        Ok(self.codec.decode_response(&reply)?)
    }
}

fn expect_ack(request: &'static str, response: Response) -> Result<Acknowledgement, ClientError> {
    match response {
        Response::Ack => Ok(Acknowledgement::Accepted),
        Response::Err => Ok(Acknowledgement::Rejected),
        response => Err(ClientError::UnexpectedResponse { request, response }),
    }
}
