//! Length-prefixed framing over a byte stream.
//!
//! TCP is a *stream* protocol: it guarantees the bytes arrive in order,
//! but not that one `write` on the sender shows up as one `read` on the
//! receiver. A message can arrive split over many reads, or glued to the
//! next one. Framing puts the message boundaries back.
//!
//! Every frame is an 8-byte ASCII decimal length, zero padded, followed
//! by exactly that many payload bytes:
//!
//! ```text
//! 00000003ack
//! ^^^^^^^^      length prefix ("3")
//!         ^^^   payload
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Width of the length prefix in bytes.
pub const PREFIX_LEN: usize = 8;

/// Largest payload an 8-digit decimal prefix can describe.
pub const MAX_PAYLOAD_LEN: usize = 99_999_999;

/// Builds a complete frame (prefix + payload) in memory.
///
/// # Errors
/// Returns [`TransportError::FrameTooLarge`] if the payload is longer
/// than [`MAX_PAYLOAD_LEN`].
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(TransportError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    // `{:08}` left-pads with zeros to 8 characters.
    frame.extend_from_slice(format!("{:08}", payload.len()).as_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Parses an 8-byte length prefix.
///
/// `str::parse::<usize>` would accept a leading `+`, so every byte is
/// checked to be an ASCII digit first.
pub fn parse_prefix(prefix: &[u8; PREFIX_LEN]) -> Result<usize, TransportError> {
    if !prefix.iter().all(u8::is_ascii_digit) {
        return Err(TransportError::Framing(
            String::from_utf8_lossy(prefix).into_owned(),
        ));
    }

    Ok(prefix
        .iter()
        .fold(0usize, |len, digit| len * 10 + usize::from(digit - b'0')))
}

/// Reads one frame and returns its payload.
///
/// Returns `Ok(None)` if the stream ends cleanly before the first byte
/// of a new frame.
///
/// If `read_timeout` is set, the whole 8-byte prefix must arrive within
/// it, and after that every payload read must make progress within it.
/// A peer that stalls anywhere inside a frame is cut off. The payload
/// buffer grows with the bytes actually received, so a large prefix
/// alone never reserves its full length.
///
/// # Errors
/// - [`TransportError::ConnectionClosed`] if the stream ends mid-frame.
/// - [`TransportError::Framing`] if the prefix is not 8 decimal digits.
/// - [`TransportError::TimedOut`] if the peer stalls past the timeout.
/// - [`TransportError::ReceiveFailed`] for any other I/O error.
pub async fn read_frame<R>(
    reader: &mut R,
    read_timeout: Option<Duration>,
) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let Some(prefix) = within(read_timeout, read_prefix(reader)).await?? else {
        return Ok(None);
    };
    let len = parse_prefix(&prefix)?;

    let mut payload = Vec::with_capacity(len.min(READ_CHUNK));
    let mut chunk = [0u8; READ_CHUNK];
    while payload.len() < len {
        let want = (len - payload.len()).min(READ_CHUNK);
        let n = within(read_timeout, reader.read(&mut chunk[..want]))
            .await?
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed(
                "stream ended inside payload".into(),
            ));
        }
        payload.extend_from_slice(&chunk[..n]);
    }

    Ok(Some(payload))
}

/// Largest single read while collecting a payload.
const READ_CHUNK: usize = 8 * 1024;

/// Reads the 8-byte prefix, or `None` on a clean end of stream.
async fn read_prefix<R>(reader: &mut R) -> Result<Option<[u8; PREFIX_LEN]>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; PREFIX_LEN];
    let first = reader
        .read(&mut prefix)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    if first == 0 {
        return Ok(None);
    }

    // The first read may have returned only part of the prefix.
    read_exactly(reader, &mut prefix[first..], "length prefix").await?;
    Ok(Some(prefix))
}

/// Runs `fut`, failing with [`TransportError::TimedOut`] after `limit`.
async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, TransportError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TransportError::TimedOut(limit)),
        None => Ok(fut.await),
    }
}

/// Writes one frame and flushes the writer.
///
/// # Errors
/// [`TransportError::FrameTooLarge`] before anything is written, or
/// [`TransportError::SendFailed`] if the write fails.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    writer
        .write_all(&frame)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}

/// `read_exact` that reports a truncated stream as a closed connection.
async fn read_exactly<R>(
    reader: &mut R,
    buf: &mut [u8],
    what: &str,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(
            TransportError::ConnectionClosed(format!("stream ended inside {what}")),
        ),
        Err(e) => Err(TransportError::ReceiveFailed(e)),
    }
}
