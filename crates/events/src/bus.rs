//! Publish/subscribe abstraction for entity messages (mechanics only).
//!
//! The bus distributes messages after the store has committed. It is not a
//! source of truth: a failed publish leaves committed state in place, and
//! consumers must tolerate receiving a message more than once.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to the bus (broadcast: every subscriber sees every message).
///
/// ```ignore
/// let subscription = bus.subscribe();
/// while let Ok(message) = subscription.recv_timeout(Duration::from_secs(1)) {
///     handle(message);
/// }
/// ```
///
/// Meant to be drained by a single thread. Messages from one publisher arrive
/// in publication order.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Collect everything already delivered without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic bus.
///
/// `publish` may fail (closed transport, poisoned state); the error is surfaced
/// to the transaction executor, which reports it after the commit succeeded.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
