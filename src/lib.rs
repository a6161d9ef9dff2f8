//! # resp-stream, an incremental RESP reply parser
//!
//! `resp-stream` is a streaming parser for the Redis serialization
//! protocol (RESP). It is built for a Redis *client*, not a server: it
//! consumes reply bytes as they arrive from a Redis connection and
//! dispatches each completed reply to the callback registered for the
//! request that produced it.
//!
//! ## Why this is the hard part
//!
//! - Replies arrive in chunks that do not respect message boundaries;
//!   the parser suspends at any byte and resumes without loss.
//! - Multi-bulk (array) replies nest arbitrarily; the assembler tracks
//!   nesting with an explicit stack rather than host-language recursion,
//!   so a single [`Parser::parse_reply`] call can close many levels of
//!   nesting in one pass (a "cascade completion").
//! - Reply order must line up with a FIFO of per-request callbacks, with
//!   a fallback default callback for server-pushed messages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Parser<H, F>                           │
//! │                                                                  │
//! │  bytes ──▶ ByteBuffer ──▶ scanner primitives ──▶ state machine    │
//! │            (buffer)       (read_line/integer/    (Clean, ReadLine,│
//! │                            length)                ReadBulk, ...)  │
//! │                                                        │          │
//! │                                                        ▼          │
//! │                                              completion cascade   │
//! │                                             (mblk_stack)          │
//! │                                                        │          │
//! │                                                        ▼          │
//! │                                                   Dispatcher<H>   │
//! │                                               (FIFO + default cb) │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Out of scope
//!
//! Transport (socket I/O), the higher-level request-issuing client,
//! subscription/pubsub semantics, connection management, reconnection,
//! and authentication are all external collaborators. The parser never
//! performs I/O; it is driven purely by [`Parser::append_bytes`] and
//! [`Parser::parse_reply`]. See `respdrive` (`src/bin/respdrive.rs`) for
//! a minimal driver built on top of it.
//!
//! ## Quick start
//!
//! ```
//! use resp_stream::{Parser, ParseOutcome, Reply};
//! use std::sync::{Arc, Mutex};
//!
//! let replies = Arc::new(Mutex::new(Vec::new()));
//! let mut parser = Parser::new((), false);
//!
//! let sink = Arc::clone(&replies);
//! parser.push_callback(Box::new(move |_client, reply| sink.lock().unwrap().push(reply)));
//!
//! parser.append_bytes(b"+OK\r\n");
//! assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
//! assert_eq!(replies.lock().unwrap()[0], Reply::SimpleString("OK".into()));
//! ```

mod buffer;
mod dispatcher;
mod error;
mod parser;
mod reply;
mod scanner;
mod state;

pub use dispatcher::Callback;
pub use error::{ParseOutcome, ProtocolError};
pub use parser::Parser;
pub use reply::{DefaultErrorFactory, ErrorFactory, Reply, ServerError};
