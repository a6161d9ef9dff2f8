//! Crate-wide error type for the RESP reply pipeline.

use thiserror::Error;

/// Outcome of a single `Parser::parse_reply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// One top-level reply was completed and handed to a callback.
    Delivered,
    /// The buffer was exhausted mid-frame; more bytes are needed.
    NeedMore,
}

/// Fatal errors raised out of the reply assembler, dispatcher, or error
/// factory. Every variant here poisons the parser (see [`crate::Parser`]):
/// once one of these is returned, the parser will return
/// [`ProtocolError::Poisoned`] on every subsequent call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A type tag byte was neither `+`, `-`, `:`, `$`, nor `*`.
    #[error("invalid reply: unknown type tag {0:#04x}")]
    InvalidTypeTag(u8),

    /// A nested type tag inside a multi-bulk reply was unrecognized.
    #[error("invalid multi-bulk reply: expected [$:+-*] but got {0:#04x}")]
    InvalidNestedTypeTag(u8),

    /// A length or integer line did not parse as a base-10 signed integer.
    #[error("invalid integer in reply: {0:?}")]
    InvalidInteger(String),

    /// `utf8_mode` is set and a bulk payload was not valid UTF-8.
    #[error("received invalid UTF-8 string from the server")]
    InvalidUtf8,

    /// The installed `ErrorFactory` failed to produce an error value.
    #[error("error factory failed to construct a reply: {0}")]
    ErrorFactoryFailed(String),

    /// A reply completed but there was no callback, and no default
    /// callback, to receive it.
    #[error("no callbacks in the queue and no default callback set")]
    NoConsumer,

    /// The parser already failed fatally once and must be torn down; it
    /// no longer processes bytes or touches its internal state.
    #[error("parser is poisoned by a prior fatal error")]
    Poisoned,
}
