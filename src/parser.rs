//! The reply assembler (C3) plus the driver-facing [`Parser`] that ties
//! together the byte buffer, scanner, dispatcher, and error factory.

use crate::buffer::ByteBuffer;
use crate::dispatcher::{Callback, Dispatcher};
use crate::error::{ParseOutcome, ProtocolError};
use crate::reply::{DefaultErrorFactory, ErrorFactory, Reply};
use crate::scanner::{read_integer, read_length, read_line};
use crate::state::{MblkFrame, State};
use bytes::Bytes;
use tracing::{trace, warn};

/// An incremental RESP reply parser bound to one client handle.
///
/// `H` is a non-owning, `Clone`-free handle the parser forwards to every
/// callback, the parser never touches it beyond that, so it never
/// extends the owning client's lifetime. `F` is the [`ErrorFactory`] used
/// to build `Reply::Error` values; it defaults to [`DefaultErrorFactory`].
///
/// Dropping a `Parser` releases its buffer, pending callbacks, default
/// callback, and any partially-assembled multi-bulk frames without
/// invoking any of them, ordinary field drop already satisfies this,
/// there is nothing fancier to opt into.
pub struct Parser<H, F = DefaultErrorFactory> {
    client_handle: H,
    buffer: ByteBuffer,
    state: State,
    mblk_level: u64,
    mblk_current: Option<Vec<Reply>>,
    mblk_remaining: u64,
    mblk_stack: Vec<MblkFrame>,
    bulk_len: usize,
    dispatcher: Dispatcher<H>,
    utf8_mode: bool,
    error_factory: F,
    poisoned: bool,
}

impl<H> Parser<H, DefaultErrorFactory> {
    /// Creates a parser bound to `client_handle`, using
    /// [`DefaultErrorFactory`] to construct error replies.
    pub fn new(client_handle: H, utf8_mode: bool) -> Self {
        Self::with_error_factory(client_handle, utf8_mode, DefaultErrorFactory)
    }
}

impl<H, F: ErrorFactory> Parser<H, F> {
    /// Creates a parser bound to `client_handle` with a custom
    /// [`ErrorFactory`].
    pub fn with_error_factory(client_handle: H, utf8_mode: bool, error_factory: F) -> Self {
        Self {
            client_handle,
            buffer: ByteBuffer::new(),
            state: State::Clean,
            mblk_level: 0,
            mblk_current: None,
            mblk_remaining: 0,
            mblk_stack: Vec::new(),
            bulk_len: 0,
            dispatcher: Dispatcher::new(),
            utf8_mode,
            error_factory,
            poisoned: false,
        }
    }

    /// Appends bytes read from the transport into the parser's buffer.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buffer.append(bytes);
    }

    /// Pushes a one-shot callback onto the FIFO, in request order.
    pub fn push_callback(&mut self, cb: Callback<H>) {
        self.dispatcher.push_callback(cb);
    }

    /// Installs (or clears) the fallback callback used when the FIFO is
    /// empty, e.g. for server-pushed pubsub messages.
    pub fn set_default_callback(&mut self, cb: Option<Callback<H>>) {
        self.dispatcher.set_default_callback(cb);
    }

    /// Drains pending callbacks and the default callback with `reply`,
    /// used to fan a single terminal error out to every in-flight
    /// requester after a transport failure.
    pub fn propagate(&mut self, reply: Reply) {
        self.dispatcher.propagate(&self.client_handle, reply);
    }

    /// Parses at most one top-level reply from the buffer.
    ///
    /// Returns `Ok(ParseOutcome::Delivered)` once a reply has been
    /// dispatched, or `Ok(ParseOutcome::NeedMore)` when the buffer was
    /// exhausted mid-frame. On a protocol fault the parser is poisoned:
    /// this call and every subsequent call return `Err`.
    pub fn parse_reply(&mut self) -> Result<ParseOutcome, ProtocolError> {
        if self.poisoned {
            return Err(ProtocolError::Poisoned);
        }
        match self.run() {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(error = %err, "RESP parser fault, poisoning parser");
                self.poisoned = true;
                Err(err)
            }
        }
    }

    fn run(&mut self) -> Result<ParseOutcome, ProtocolError> {
        if self.buffer.is_empty() {
            return Ok(ParseOutcome::NeedMore);
        }

        if self.state == State::Clean {
            let tag = self.buffer.peek_byte();
            self.buffer.consume_front(1);
            self.state = self.enter_state_for_tag(tag)?;
        }

        loop {
            if self.buffer.len() < 2 {
                return Ok(ParseOutcome::NeedMore);
            }

            match self.state {
                State::ReadLine => match read_line(&mut self.buffer) {
                    Some(line) => {
                        if let Some(outcome) = self.finish_value(Reply::SimpleString(line))? {
                            return Ok(outcome);
                        }
                    }
                    None => return Ok(ParseOutcome::NeedMore),
                },

                State::ReadError => match read_line(&mut self.buffer) {
                    Some(line) => {
                        let err = self
                            .error_factory
                            .construct(&line)
                            .map_err(ProtocolError::ErrorFactoryFailed)?;
                        if let Some(outcome) = self.finish_value(Reply::Error(err))? {
                            return Ok(outcome);
                        }
                    }
                    None => return Ok(ParseOutcome::NeedMore),
                },

                State::ReadNumber => match read_integer(&mut self.buffer)? {
                    Some(n) => {
                        if let Some(outcome) = self.finish_value(Reply::Integer(n))? {
                            return Ok(outcome);
                        }
                    }
                    None => return Ok(ParseOutcome::NeedMore),
                },

                State::ReadBulkLen => match read_length(&mut self.buffer)? {
                    Some(len) if len >= 0 => {
                        self.bulk_len = len as usize;
                        self.state = State::ReadBulk;
                    }
                    Some(-1) => {
                        if let Some(outcome) = self.finish_value(Reply::Bulk(None))? {
                            return Ok(outcome);
                        }
                    }
                    Some(bad) => return Err(ProtocolError::InvalidInteger(bad.to_string())),
                    None => return Ok(ParseOutcome::NeedMore),
                },

                State::ReadBulk => {
                    let needed = self.bulk_len + 2;
                    if self.buffer.len() < needed {
                        return Ok(ParseOutcome::NeedMore);
                    }
                    let data = Bytes::copy_from_slice(self.buffer.take_slice(self.bulk_len));
                    self.buffer.consume_front(needed);
                    if self.utf8_mode {
                        std::str::from_utf8(&data).map_err(|_| ProtocolError::InvalidUtf8)?;
                    }
                    if let Some(outcome) = self.finish_value(Reply::Bulk(Some(data)))? {
                        return Ok(outcome);
                    }
                }

                State::ReadMblkLen => match read_length(&mut self.buffer)? {
                    Some(len) if len > 0 => {
                        self.mblk_current = Some(Vec::with_capacity(len as usize));
                        self.mblk_remaining = len as u64;
                        self.state = State::WaitBulks;
                    }
                    Some(len) if len == 0 || len == -1 => {
                        let value = if len == 0 {
                            Reply::Array(Some(Vec::new()))
                        } else {
                            Reply::Array(None)
                        };
                        // This array is finished as soon as its length is
                        // known; close it out at the *parent* level before
                        // cascading, restoring the outer frame if one was
                        // saved on the stack.
                        self.mblk_level -= 1;
                        if self.mblk_level > 0 {
                            let frame = self
                                .mblk_stack
                                .pop()
                                .expect("stack depth == mblk_level whenever mblk_level > 0 here");
                            self.mblk_current = Some(frame.array);
                            self.mblk_remaining = frame.remaining;
                        }
                        if let Some(outcome) = self.finish_value(value)? {
                            return Ok(outcome);
                        }
                    }
                    Some(bad) => return Err(ProtocolError::InvalidInteger(bad.to_string())),
                    None => return Ok(ParseOutcome::NeedMore),
                },

                State::WaitBulks => {
                    let tag = self.buffer.peek_byte();
                    self.buffer.consume_front(1);
                    match tag {
                        b'+' => self.state = State::ReadLine,
                        b'-' => self.state = State::ReadError,
                        b':' => self.state = State::ReadNumber,
                        b'$' => self.state = State::ReadBulkLen,
                        b'*' => {
                            let current = self
                                .mblk_current
                                .take()
                                .expect("WaitBulks implies an open multi-bulk frame");
                            self.mblk_stack.push(MblkFrame {
                                array: current,
                                remaining: self.mblk_remaining,
                            });
                            self.mblk_level += 1;
                            self.state = State::ReadMblkLen;
                        }
                        other => return Err(ProtocolError::InvalidNestedTypeTag(other)),
                    }
                }
            }
        }
    }

    fn enter_state_for_tag(&mut self, tag: u8) -> Result<State, ProtocolError> {
        match tag {
            b'+' => Ok(State::ReadLine),
            b'-' => Ok(State::ReadError),
            b':' => Ok(State::ReadNumber),
            b'$' => Ok(State::ReadBulkLen),
            b'*' => {
                self.mblk_level = 1;
                Ok(State::ReadMblkLen)
            }
            other => Err(ProtocolError::InvalidTypeTag(other)),
        }
    }

    /// Completion cascade: folds a just-produced value into the
    /// innermost open multi-bulk frame, closing arbitrarily many nested
    /// frames in a single pass when the final item of each completes.
    /// Runs as an explicit loop over `mblk_stack`, never host-language
    /// recursion, so a deeply nested reply costs stack space
    /// proportional to its nesting depth, not to the call stack.
    ///
    /// Returns `Ok(Some(Delivered))` once the top-level reply has been
    /// dispatched, or `Ok(None)` when more nested items are still
    /// expected (state is left in `WaitBulks`).
    fn finish_value(&mut self, mut value: Reply) -> Result<Option<ParseOutcome>, ProtocolError> {
        loop {
            if self.mblk_level == 0 {
                self.state = State::Clean;
                self.dispatcher.dispatch(&self.client_handle, value)?;
                trace!("delivered top-level reply");
                return Ok(Some(ParseOutcome::Delivered));
            }

            let current = self
                .mblk_current
                .as_mut()
                .expect("mblk_level > 0 implies mblk_current is present");
            current.push(value);

            if self.mblk_remaining > 1 {
                self.mblk_remaining -= 1;
                self.state = State::WaitBulks;
                return Ok(None);
            }

            if self.mblk_level > 1 {
                let array = self.mblk_current.take().unwrap();
                let frame = self
                    .mblk_stack
                    .pop()
                    .expect("stack depth == mblk_level - 1 whenever mblk_level > 0");
                self.mblk_current = Some(frame.array);
                self.mblk_remaining = frame.remaining;
                self.mblk_level -= 1;
                value = Reply::Array(Some(array));
                continue;
            }

            let array = self.mblk_current.take().unwrap();
            self.mblk_level = 0;
            self.state = State::Clean;
            self.dispatcher
                .dispatch(&self.client_handle, Reply::Array(Some(array)))?;
            trace!("delivered top-level array reply");
            return Ok(Some(ParseOutcome::Delivered));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn parser_with_callbacks(n: usize) -> (Parser<()>, Arc<Mutex<Vec<Reply>>>) {
        let mut parser = Parser::new((), false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..n {
            let for_cb = Arc::clone(&seen);
            parser.push_callback(Box::new(move |_h, r| for_cb.lock().unwrap().push(r)));
        }
        (parser, seen)
    }

    #[test]
    fn simple_string() {
        let (mut parser, seen) = parser_with_callbacks(1);
        parser.append_bytes(b"+OK\r\n");
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Reply::SimpleString(Bytes::from_static(b"OK"))]
        );
    }

    #[test]
    fn integer_split_across_calls() {
        let (mut parser, seen) = parser_with_callbacks(1);
        parser.append_bytes(b":12");
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::NeedMore);
        parser.append_bytes(b"3\r\n");
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
        assert_eq!(*seen.lock().unwrap(), vec![Reply::Integer(123)]);
    }

    #[test]
    fn bulk_with_embedded_crlf() {
        let (mut parser, seen) = parser_with_callbacks(1);
        parser.append_bytes(b"$5\r\na\r\nb\r\n");
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Reply::Bulk(Some(Bytes::from_static(b"a\r\nb")))]
        );
    }

    #[test]
    fn nil_and_empty_bulk() {
        let (mut parser, seen) = parser_with_callbacks(2);
        parser.append_bytes(b"$-1\r\n$0\r\n\r\n");
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Reply::Bulk(None),
                Reply::Bulk(Some(Bytes::from_static(b"")))
            ]
        );
    }

    #[test]
    fn nested_multi_bulk() {
        let (mut parser, seen) = parser_with_callbacks(1);
        parser.append_bytes(b"*2\r\n*2\r\n:1\r\n:2\r\n$3\r\nfoo\r\n");
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Reply::Array(Some(vec![
                Reply::Array(Some(vec![Reply::Integer(1), Reply::Integer(2)])),
                Reply::Bulk(Some(Bytes::from_static(b"foo"))),
            ]))]
        );
    }

    #[test]
    fn error_reply_is_delivered_not_raised() {
        let (mut parser, seen) = parser_with_callbacks(1);
        parser.append_bytes(b"-ERR bad\r\n");
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
        match &seen.lock().unwrap()[0] {
            Reply::Error(e) => {
                assert_eq!(e.class, "");
                assert_eq!(e.message, "ERR bad");
            }
            other => panic!("expected error reply, got {other:?}"),
        }
    }

    #[test]
    fn multiple_replies_fed_one_byte_at_a_time() {
        let (mut parser, seen) = parser_with_callbacks(2);
        let stream = b"+A\r\n:7\r\n";
        let mut delivered = 0;
        for &byte in stream {
            parser.append_bytes(&[byte]);
            loop {
                match parser.parse_reply().unwrap() {
                    ParseOutcome::Delivered => delivered += 1,
                    ParseOutcome::NeedMore => break,
                }
            }
        }
        assert_eq!(delivered, 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Reply::SimpleString(Bytes::from_static(b"A")),
                Reply::Integer(7)
            ]
        );
    }

    #[test]
    fn propagate_on_disconnect_drains_fifo_then_default() {
        let mut parser = Parser::new((), false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let for_cb = Arc::clone(&seen);
            parser.push_callback(Box::new(move |_h, _r| for_cb.lock().unwrap().push(i)));
        }
        let for_default = Arc::clone(&seen);
        parser.set_default_callback(Some(Box::new(move |_h, _r| {
            for_default.lock().unwrap().push(3)
        })));

        parser.propagate(Reply::Error(crate::reply::ServerError {
            class: "ERR".into(),
            message: "disconnected".into(),
        }));

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn nil_array_distinct_from_nil_bulk() {
        let (mut parser, seen) = parser_with_callbacks(1);
        parser.append_bytes(b"*-1\r\n");
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
        assert_eq!(*seen.lock().unwrap(), vec![Reply::Array(None)]);
    }

    #[test]
    fn empty_array() {
        let (mut parser, seen) = parser_with_callbacks(1);
        parser.append_bytes(b"*0\r\n");
        assert_eq!(parser.parse_reply().unwrap(), ParseOutcome::Delivered);
        assert_eq!(*seen.lock().unwrap(), vec![Reply::Array(Some(Vec::new()))]);
    }

    #[test]
    fn poisons_after_fatal_error() {
        let mut parser: Parser<()> = Parser::new((), false);
        parser.append_bytes(b"@nope\r\n");
        assert!(matches!(
            parser.parse_reply(),
            Err(ProtocolError::InvalidTypeTag(b'@'))
        ));
        assert!(matches!(
            parser.parse_reply(),
            Err(ProtocolError::Poisoned)
        ));
    }

    #[test]
    fn utf8_mode_rejects_invalid_utf8_bulk() {
        let mut parser: Parser<()> = Parser::new((), true);
        parser.push_callback(Box::new(|_h, _r| {}));
        parser.append_bytes(b"$3\r\n\xff\xfe\xfd\r\n");
        assert!(matches!(
            parser.parse_reply(),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn chunk_partition_invariance() {
        let stream: &[u8] = b"*3\r\n:1\r\n$3\r\nfoo\r\n+OK\r\n";

        // Whole stream at once.
        let (mut whole, whole_seen) = parser_with_callbacks(1);
        whole.append_bytes(stream);
        while whole.parse_reply().unwrap() == ParseOutcome::Delivered {}

        // Split into arbitrary small chunks.
        let (mut chunked, chunked_seen) = parser_with_callbacks(1);
        for chunk in stream.chunks(3) {
            chunked.append_bytes(chunk);
            loop {
                match chunked.parse_reply().unwrap() {
                    ParseOutcome::Delivered => continue,
                    ParseOutcome::NeedMore => break,
                }
            }
        }

        assert_eq!(*whole_seen.lock().unwrap(), *chunked_seen.lock().unwrap());
    }
}
