//! Line-reader primitives built on top of [`ByteBuffer`].
//!
//! Each primitive here is atomic with respect to the buffer: either it
//! finds a complete CRLF-terminated line and consumes the whole thing
//! (tag excluded, callers have already stripped that), or it consumes
//! nothing and reports "pending".

use crate::buffer::ByteBuffer;
use crate::error::ProtocolError;
use bytes::Bytes;

/// Reads a CRLF-terminated line, consuming it (including the CRLF).
///
/// Returns `None` if no complete line is available yet.
pub fn read_line(buf: &mut ByteBuffer) -> Option<Bytes> {
    let pos = buf.find_crlf()?;
    let line = Bytes::copy_from_slice(buf.take_slice(pos));
    buf.consume_front(pos + 2);
    Some(line)
}

/// Reads a CRLF-terminated line and parses it as a signed base-10
/// integer, consuming the line on success.
///
/// Returns `Ok(None)` if no complete line is available yet. A line that
/// is present but not a valid integer is a fatal
/// [`ProtocolError::InvalidInteger`] rather than a silently truncated
/// value, a conforming server never sends one.
pub fn read_integer(buf: &mut ByteBuffer) -> Result<Option<i64>, ProtocolError> {
    let pos = match buf.find_crlf() {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let raw = String::from_utf8_lossy(buf.take_slice(pos)).into_owned();
    let value: i64 = raw
        .parse()
        .map_err(|_| ProtocolError::InvalidInteger(raw.clone()))?;
    buf.consume_front(pos + 2);
    Ok(Some(value))
}

/// Reads a length header (bulk length or multi-bulk count).
///
/// Framing and failure modes are identical to [`read_integer`]; the
/// distinction is purely in how the caller interprets the value (`-1`
/// means nil, never a parse failure).
#[inline]
pub fn read_length(buf: &mut ByteBuffer) -> Result<Option<i64>, ProtocolError> {
    read_integer(buf)
}
