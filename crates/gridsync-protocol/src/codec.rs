//! Codec trait and implementations for requests and responses.
//!
//! A codec turns [`Request`]s and [`Response`]s into payload bytes and
//! back. It knows nothing about framing: the transport has already cut
//! the byte stream into whole payloads before a codec sees them.

use crate::{ProtocolError, Request, Response};
#[cfg(feature = "json")]
use crate::{MapId, TokenPlacement, TokenSet};

/// Converts protocol messages to and from payload bytes.
///
/// `Send + Sync + 'static` so one codec can be shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a request.
    fn encode_request(&self, request: &Request) -> Result<Vec<u8>, ProtocolError>;

    /// Parses a request.
    ///
    /// # Errors
    /// - [`ProtocolError::Payload`] if the bytes are not a request object.
    /// - [`ProtocolError::UnknownOperation`] if `op`/`arg` name nothing
    ///   the server implements.
    fn decode_request(&self, data: &[u8]) -> Result<Request, ProtocolError>;

    /// Serializes a response.
    fn encode_response(&self, response: &Response) -> Result<Vec<u8>, ProtocolError>;

    /// Parses a response.
    ///
    /// # Errors
    /// [`ProtocolError::Payload`] if the bytes are neither a bare
    /// `ack`/`err` nor a map identifier or token set.
    fn decode_response(&self, data: &[u8]) -> Result<Response, ProtocolError>;
}

/// Bare-word acknowledgement payload.
pub const ACK: &[u8] = b"ack";
/// Bare-word error payload.
pub const ERR: &[u8] = b"err";
/// Unwrapped close sentinel still sent by older clients.
pub const LEGACY_QUIT: &[u8] = b"quit";

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use gridsync_protocol::{Codec, JsonCodec, Request, Response, MapId};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode_request(&Request::GetMap).unwrap();
/// assert_eq!(bytes, br#"{"op":"get","arg":"map"}"#);
///
/// let response = codec.decode_response(br#""default.csv""#).unwrap();
/// assert_eq!(response, Response::Map(MapId::new("default.csv")));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

/// The loosely-typed shape every request has on the wire.
#[cfg(feature = "json")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RawRequest {
    op: String,
    arg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

#[cfg(feature = "json")]
impl RawRequest {
    /// Takes the `data` field, failing if the operation needs it and it's absent.
    fn require_data(&mut self) -> Result<serde_json::Value, ProtocolError> {
        self.data.take().ok_or_else(|| {
            ProtocolError::Payload(format!("{}/{} requires data", self.op, self.arg))
        })
    }
}

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode_request(&self, request: &Request) -> Result<Vec<u8>, ProtocolError> {
        let data = match request {
            Request::GetMap | Request::GetTokens | Request::Close => None,
            Request::PlaceToken(placement) => {
                Some(serde_json::to_value(placement).map_err(ProtocolError::Encode)?)
            }
            Request::SetMap { identifier } => {
                Some(serde_json::Value::String(identifier.0.clone()))
            }
        };

        let raw = RawRequest {
            op: request.op().to_string(),
            arg: request.arg().to_string(),
            data,
        };
        serde_json::to_vec(&raw).map_err(ProtocolError::Encode)
    }

    fn decode_request(&self, data: &[u8]) -> Result<Request, ProtocolError> {
        if data.trim_ascii() == LEGACY_QUIT {
            return Ok(Request::Close);
        }

        // `?` converts a `serde_json::Error` into `ProtocolError::Payload`
        // through the `From` impl in error.rs.
        let mut raw: RawRequest = serde_json::from_slice(data)?;

        match (raw.op.as_str(), raw.arg.as_str()) {
            ("get", "map") => Ok(Request::GetMap),
            ("get", "tokens") => Ok(Request::GetTokens),
            ("set", "place_token") => {
                let placement: TokenPlacement =
                    serde_json::from_value(raw.require_data()?)?;
                Ok(Request::PlaceToken(placement))
            }
            ("admin", "set_map") => match raw.require_data()? {
                serde_json::Value::String(id) => Ok(Request::SetMap {
                    identifier: MapId(id),
                }),
                other => Err(ProtocolError::Payload(format!(
                    "set_map expects a string, got {other}"
                ))),
            },
            ("session", "close") => Ok(Request::Close),
            _ => Err(ProtocolError::UnknownOperation {
                op: raw.op,
                arg: raw.arg,
            }),
        }
    }

    fn encode_response(&self, response: &Response) -> Result<Vec<u8>, ProtocolError> {
        match response {
            Response::Ack => Ok(ACK.to_vec()),
            Response::Err => Ok(ERR.to_vec()),
            Response::Map(id) => serde_json::to_vec(id).map_err(ProtocolError::Encode),
            Response::Tokens(tokens) => {
                serde_json::to_vec(tokens).map_err(ProtocolError::Encode)
            }
        }
    }

    fn decode_response(&self, data: &[u8]) -> Result<Response, ProtocolError> {
        if data == ACK {
            return Ok(Response::Ack);
        }
        if data == ERR {
            return Ok(Response::Err);
        }

        let value: serde_json::Value = serde_json::from_slice(data)?;
        match value {
            serde_json::Value::String(id) => Ok(Response::Map(MapId(id))),
            value @ serde_json::Value::Object(_) => {
                let tokens: TokenSet = serde_json::from_value(value)?;
                Ok(Response::Tokens(tokens))
            }
            other => Err(ProtocolError::Payload(format!(
                "unexpected response value {other}"
            ))),
        }
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Position, TokenRecord};

    fn hero() -> TokenPlacement {
        TokenPlacement {
            name: "Hero".into(),
            position: Some(Position::new(0, 0)),
            image: "black_circle".into(),
        }
    }

    #[test]
    fn test_request_round_trip() {
        let codec = JsonCodec;
        let requests = [
            Request::GetMap,
            Request::GetTokens,
            Request::PlaceToken(hero()),
            Request::PlaceToken(TokenPlacement {
                name: "Ghost".into(),
                position: None,
                image: "ghost2x".into(),
            }),
            Request::SetMap {
                identifier: MapId::new("dungeon level 2.csv"),
            },
            Request::Close,
        ];

        for request in requests {
            let bytes = codec.encode_request(&request).unwrap();
            assert_eq!(codec.decode_request(&bytes).unwrap(), request);
        }
    }

    #[test]
    fn test_response_round_trip() {
        let codec = JsonCodec;
        let mut tokens = TokenSet::new();
        tokens.insert("Hero", TokenRecord::new(Some(Position::new(1, 2)), "knight"));
        tokens.insert("Ghost", TokenRecord::new(None, "ghost"));

        let responses = [
            Response::Ack,
            Response::Err,
            Response::Map(MapId::new("default.csv")),
            // A map that happens to be called "ack" is still a map.
            Response::Map(MapId::new("ack")),
            Response::Tokens(TokenSet::new()),
            Response::Tokens(tokens),
        ];

        for response in responses {
            let bytes = codec.encode_response(&response).unwrap();
            assert_eq!(codec.decode_response(&bytes).unwrap(), response);
        }
    }

    #[test]
    fn test_wire_format_matches_documented_examples() {
        let codec = JsonCodec;
        assert_eq!(
            codec.encode_request(&Request::PlaceToken(hero())).unwrap(),
            br#"{"op":"set","arg":"place_token","data":{"name":"Hero","row":0,"col":0,"img":"black_circle"}}"#
        );
        assert_eq!(
            codec
                .encode_request(&Request::SetMap {
                    identifier: MapId::new("cave.csv"),
                })
                .unwrap(),
            br#"{"op":"admin","arg":"set_map","data":"cave.csv"}"#
        );
        assert_eq!(codec.encode_response(&Response::Ack).unwrap(), b"ack");
        assert_eq!(
            codec
                .encode_response(&Response::Map(MapId::new("default.csv")))
                .unwrap(),
            br#""default.csv""#
        );
    }

    #[test]
    fn test_decode_legacy_quit() {
        let codec = JsonCodec;
        assert_eq!(codec.decode_request(b"quit").unwrap(), Request::Close);
        assert_eq!(codec.decode_request(b"quit\n").unwrap(), Request::Close);
    }

    #[test]
    fn test_decode_truncated_json_is_payload_error() {
        let err = JsonCodec
            .decode_request(br#"{"op":"get","arg":"ma"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Payload(_)), "{err}");
    }

    #[test]
    fn test_decode_missing_arg_is_payload_error() {
        let err = JsonCodec.decode_request(br#"{"op":"get"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Payload(_)), "{err}");
    }

    #[test]
    fn test_decode_unknown_operation() {
        for payload in [
            &br#"{"op":"get","arg":"dice"}"#[..],
            br#"{"op":"delete","arg":"tokens"}"#,
            br#"{"op":"admin","arg":"shutdown"}"#,
            br#"{"op":"set","arg":"map","data":"x.csv"}"#,
        ] {
            let err = JsonCodec.decode_request(payload).unwrap_err();
            assert!(
                matches!(err, ProtocolError::UnknownOperation { .. }),
                "{err}"
            );
        }
    }

    #[test]
    fn test_decode_place_token_without_data() {
        let err = JsonCodec
            .decode_request(br#"{"op":"set","arg":"place_token"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Payload(_)));
    }

    #[test]
    fn test_decode_place_token_with_bad_data() {
        let err = JsonCodec
            .decode_request(br#"{"op":"set","arg":"place_token","data":{"name":"Hero","row":"one","col":0,"img":"x"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Payload(_)));
    }

    #[test]
    fn test_decode_set_map_requires_string() {
        let err = JsonCodec
            .decode_request(br#"{"op":"admin","arg":"set_map","data":42}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Payload(_)));
    }

    #[test]
    fn test_decode_response_rejects_other_values() {
        for payload in [&b"42"[..], b"[]", b"ACK", b"{\"Hero\":1}", b""] {
            let err = JsonCodec.decode_response(payload).unwrap_err();
            assert!(matches!(err, ProtocolError::Payload(_)), "{payload:?}");
        }
    }
}
