//! Append-only byte buffer with cheap front-consumption.
//!
//! This is the parser's only interface to raw bytes. Everything upstream
//! (the frame scanner, the reply assembler) reads through here so that no
//! byte is ever observed twice and nothing is copied until a frame is
//! actually complete.

use bytes::{Buf, BytesMut};

/// Append-only byte sink backed by `BytesMut`.
///
/// `BytesMut::split_to` is refcount-based, not a memmove, so consuming the
/// front of the buffer on the steady-state path (one reply per read) is
/// cheap even under sustained throughput.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    inner: BytesMut,
}

impl ByteBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            inner: BytesMut::new(),
        }
    }

    /// Appends bytes to the end of the buffer.
    pub fn append(&mut self, bytes: &[u8]) {
        self.inner.extend_from_slice(bytes);
    }

    /// Current number of unconsumed bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// First byte without consuming it. Panics if the buffer is empty.
    #[inline]
    pub fn peek_byte(&self) -> u8 {
        self.inner[0]
    }

    /// Drops the leading `n` bytes. Panics if `n > self.len()`.
    #[inline]
    pub fn consume_front(&mut self, n: usize) {
        self.inner.advance(n);
    }

    /// View of the first `n` bytes without consuming them.
    #[inline]
    pub fn take_slice(&self, n: usize) -> &[u8] {
        &self.inner[..n]
    }

    /// Index of the first `\r\n` in the buffer, if any.
    ///
    /// Scans offsets `0..len-1` so `i+1` is always in bounds; a CRLF
    /// straddling the final byte is reported as "not found" until more
    /// bytes arrive.
    pub fn find_crlf(&self) -> Option<usize> {
        let buf = &self.inner[..];
        for i in 0..buf.len().saturating_sub(1) {
            if buf[i] == b'\r' && buf[i + 1] == b'\n' {
                return Some(i);
            }
        }
        None
    }
}
