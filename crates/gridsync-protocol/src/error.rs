//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the *framing* was fine: a complete
//! payload arrived, but its contents could not be used. The connection
//! stays in sync and can carry the next message.

/// Errors that can occur while encoding or decoding payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The payload is not a well-formed message: not JSON, missing
    /// `op`/`arg`, or carrying `data` of the wrong shape.
    #[error("malformed payload: {0}")]
    Payload(String),

    /// The payload is well-formed but names an operation that does not
    /// exist, e.g. `{"op": "get", "arg": "dice"}`.
    #[error("unknown operation {op}/{arg}")]
    UnknownOperation { op: String, arg: String },
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for ProtocolError {
    /// Decoding failures from `serde_json` are payload errors.
    fn from(e: serde_json::Error) -> Self {
        Self::Payload(e.to_string())
    }
}
