//! RESP reply values.
//!
//! Unlike a request-side encoder, this crate never needs to serialize a
//! `Reply` back to wire bytes, replies only ever flow server-to-client
//! here, so there is deliberately no `serialize`/`serialize_into` on this
//! type (see the parser's non-goals).

use bytes::Bytes;
use std::fmt;

/// A single parsed RESP reply, possibly containing nested replies.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+<line>\r\n`, a short, non-binary-safe status line.
    SimpleString(Bytes),

    /// `-<line>\r\n`, a server-signaled error, constructed by an
    /// [`crate::ErrorFactory`]. This is an ordinary reply value, not a
    /// local failure: it is delivered to the requester's callback like
    /// any other reply.
    Error(ServerError),

    /// `:<int>\r\n`, a signed 64-bit integer.
    Integer(i64),

    /// `$<len>\r\n<bytes>\r\n`, or `$-1\r\n` for nil.
    Bulk(Option<Bytes>),

    /// `*<len>\r\n<reply>*len`, or `*-1\r\n` for nil.
    ///
    /// Kept as its own nil, distinct from `Bulk(None)`: a nil array and
    /// an empty bulk string are different facts about what the server
    /// sent, and collapsing them loses that distinction.
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// Convenience constructor for a nil bulk string.
    pub fn nil_bulk() -> Self {
        Reply::Bulk(None)
    }

    /// Convenience constructor for a nil array.
    pub fn nil_array() -> Self {
        Reply::Array(None)
    }

    /// `true` for `Bulk(None)` or `Array(None)`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Bulk(None) | Reply::Array(None))
    }

    /// `true` for `Error`.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::SimpleString(s) => write!(f, "\"{}\"", String::from_utf8_lossy(s)),
            Reply::Error(e) => write!(f, "(error) {}", e),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(Some(data)) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            Reply::Bulk(None) => write!(f, "(nil)"),
            Reply::Array(None) => write!(f, "(nil)"),
            Reply::Array(Some(values)) if values.is_empty() => write!(f, "(empty array)"),
            Reply::Array(Some(values)) => {
                writeln!(f)?;
                for (i, v) in values.iter().enumerate() {
                    writeln!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}

/// A typed error reply: a class (e.g. `"ERR"` or `"WRONGTYPE"`, empty if
/// the factory does not classify errors) plus the message text.
///
/// The assembler never builds one of these directly; it always goes
/// through an [`ErrorFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub class: String,
    pub message: String,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            write!(f, "{}", self.message)
        } else if self.message.is_empty() {
            write!(f, "{}", self.class)
        } else {
            write!(f, "{} {}", self.class, self.message)
        }
    }
}

impl std::error::Error for ServerError {}

/// Constructs [`ServerError`] values from a raw `-<line>` error body.
///
/// This is the one pluggable construction seam exposed to callers.
/// Implementations must always succeed; if a factory cannot classify a
/// line it should fall back to an empty class rather than fail, since the
/// assembler treats a factory failure as fatal
/// (`ProtocolError::ErrorFactoryFailed`).
pub trait ErrorFactory: Send {
    /// Builds an error reply from the bytes between `-` and the
    /// terminating CRLF.
    fn construct(&mut self, line: &[u8]) -> Result<ServerError, String>;
}

/// Default factory: the wire carries no separate class field, only one
/// line of text, so this keeps the entire line as `message` and leaves
/// `class` empty rather than guessing a split point.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorFactory;

impl ErrorFactory for DefaultErrorFactory {
    fn construct(&mut self, line: &[u8]) -> Result<ServerError, String> {
        Ok(ServerError {
            class: String::new(),
            message: String::from_utf8_lossy(line).into_owned(),
        })
    }
}
