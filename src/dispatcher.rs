//! FIFO callback dispatch (C4).
//!
//! Owns the queue of one-shot callbacks plus the optional default
//! callback, and is the only place a completed [`Reply`] is ever handed
//! to user code.

use crate::error::ProtocolError;
use crate::reply::Reply;
use std::collections::VecDeque;

/// A one-shot (or default) reply callback.
///
/// Invoked synchronously with `(client_handle, reply)`. `H` is whatever
/// non-owning handle type the caller chose to bind the parser to, the
/// dispatcher never constructs or inspects it, only forwards it.
pub type Callback<H> = Box<dyn FnMut(&H, Reply) + Send + 'static>;

#[derive(Default)]
pub struct Dispatcher<H> {
    callbacks: VecDeque<Callback<H>>,
    default_cb: Option<Callback<H>>,
}

impl<H> Dispatcher<H> {
    pub fn new() -> Self {
        Self {
            callbacks: VecDeque::new(),
            default_cb: None,
        }
    }

    pub fn push_callback(&mut self, cb: Callback<H>) {
        self.callbacks.push_back(cb);
    }

    pub fn set_default_callback(&mut self, cb: Option<Callback<H>>) {
        self.default_cb = cb;
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.callbacks.len()
    }

    #[cfg(test)]
    pub fn has_default(&self) -> bool {
        self.default_cb.is_some()
    }

    /// Routes one completed reply to exactly one consumer: the head of
    /// the FIFO if non-empty, else the default callback (left
    /// installed), else a fatal [`ProtocolError::NoConsumer`].
    pub fn dispatch(&mut self, handle: &H, reply: Reply) -> Result<(), ProtocolError> {
        if let Some(mut cb) = self.callbacks.pop_front() {
            cb(handle, reply);
            Ok(())
        } else if let Some(cb) = self.default_cb.as_mut() {
            cb(handle, reply);
            Ok(())
        } else {
            Err(ProtocolError::NoConsumer)
        }
    }

    /// Drains the FIFO and then the default callback (consuming it),
    /// invoking each in order with a clone of `reply`. Used to fan a
    /// single terminal error out to every in-flight requester on
    /// transport failure.
    pub fn propagate(&mut self, handle: &H, reply: Reply) {
        while let Some(mut cb) = self.callbacks.pop_front() {
            cb(handle, reply.clone());
        }
        if let Some(mut cb) = self.default_cb.take() {
            cb(handle, reply);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn dispatch_prefers_fifo_over_default() {
        let mut d: Dispatcher<()> = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_cb = Arc::clone(&seen);
        d.push_callback(Box::new(move |_h, r| seen_cb.lock().unwrap().push(r)));
        let seen_default = Arc::clone(&seen);
        d.set_default_callback(Some(Box::new(move |_h, r| {
            seen_default.lock().unwrap().push(r)
        })));

        d.dispatch(&(), Reply::Integer(1)).unwrap();
        assert_eq!(d.pending_len(), 0);
        assert!(d.has_default());
        assert_eq!(*seen.lock().unwrap(), vec![Reply::Integer(1)]);
    }

    #[test]
    fn dispatch_falls_back_to_default_when_fifo_empty() {
        let mut d: Dispatcher<()> = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        d.set_default_callback(Some(Box::new(move |_h, r| seen_cb.lock().unwrap().push(r))));

        d.dispatch(&(), Reply::Integer(7)).unwrap();
        assert!(d.has_default(), "default callback stays installed");
        assert_eq!(*seen.lock().unwrap(), vec![Reply::Integer(7)]);
    }

    #[test]
    fn dispatch_with_no_consumer_is_fatal() {
        let mut d: Dispatcher<()> = Dispatcher::new();
        assert_eq!(
            d.dispatch(&(), Reply::Integer(1)),
            Err(ProtocolError::NoConsumer)
        );
    }

    #[test]
    fn propagate_drains_fifo_then_default_in_order() {
        let mut d: Dispatcher<()> = Dispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            d.push_callback(Box::new(move |_h, _r| order.lock().unwrap().push(i)));
        }
        let order_default = Arc::clone(&order);
        d.set_default_callback(Some(Box::new(move |_h, _r| {
            order_default.lock().unwrap().push(3)
        })));

        d.propagate(&(), Reply::Error(crate::reply::ServerError {
            class: "ERR".into(),
            message: "disconnected".into(),
        }));

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(d.pending_len(), 0);
        assert!(!d.has_default());
    }
}
