use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed, possibly in the middle of a frame.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to a remote server failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The length prefix was not 8 decimal digits.
    ///
    /// There is no way to find the start of the next frame after this,
    /// so the connection has to be dropped.
    #[error("bad length prefix {0:?}")]
    Framing(String),

    /// The payload does not fit in an 8-digit length prefix.
    #[error("payload of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    /// No request started within the idle timeout.
    #[error("no data received within {0:?}")]
    TimedOut(Duration),
}

impl TransportError {
    /// Returns `true` if the error means the stream is unusable and the
    /// connection should be torn down.
    ///
    /// Everything except [`FrameTooLarge`](Self::FrameTooLarge) is fatal:
    /// an oversized payload is rejected before any byte hits the socket.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FrameTooLarge(_))
    }
}
