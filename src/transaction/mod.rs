//! Outstanding requests and their completions.
//!
//! A [`Transaction`] owns the closure that receives the terminal outcome of
//! one request. The transport keeps it in a [`TransactionRegistry`] until a
//! response arrives, the caller cancels, or the transport stops; whichever
//! removes the entry first decides the outcome, so the closure runs at most
//! once.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::{
    correlation::TransactionId,
    frame::ProtocolError,
    service::ServiceId,
    status::Status,
};

pub mod registry;

pub use registry::TransactionRegistry;

/// Terminal outcome delivered to a transaction.
pub type Outcome = Result<Response, TransactionError>;

/// Reasons a transaction ended without a device response.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    /// The transport was shut down while the request was outstanding.
    #[error("transport shut down before a response arrived")]
    Shutdown,
    /// The device disappeared while the request was outstanding.
    #[error("device removed before a response arrived")]
    DeviceRemoved,
    /// The device rejected the request with a protocol error.
    #[error("device reported protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The response arrived but its body could not be parsed.
    #[error("device sent a malformed response")]
    Malformed,
}

/// Request a [`Response`] answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseOrigin {
    /// Session open handshake.
    Open,
    /// Session close handshake.
    Close,
    /// Device service command.
    Command {
        /// Service that answered.
        service: ServiceId,
        /// Command identifier within the service.
        cid: u32,
    },
}

/// Device answer to a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    transaction_id: TransactionId,
    origin: ResponseOrigin,
    status: Status,
    payload: Bytes,
}

impl Response {
    /// Construct a response.
    #[must_use]
    pub fn new(
        transaction_id: TransactionId,
        origin: ResponseOrigin,
        status: Status,
        payload: Bytes,
    ) -> Self {
        Self {
            transaction_id,
            origin,
            status,
            payload,
        }
    }

    /// Identifier of the answered request.
    #[must_use]
    pub const fn transaction_id(&self) -> TransactionId { self.transaction_id }

    /// Kind of request answered.
    #[must_use]
    pub const fn origin(&self) -> ResponseOrigin { self.origin }

    /// Status reported by the device.
    #[must_use]
    pub const fn status(&self) -> Status { self.status }

    /// Response information buffer.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Consume the response, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }
}

type Completion = Box<dyn FnOnce(Outcome) + Send>;

/// Completion handler for one outstanding request.
///
/// Any state the handler needs travels in the closure. Handlers run on the
/// receiver task, or on the task calling
/// [`shutdown`](crate::transport::Transport::shutdown), and should return
/// quickly.
///
/// # Examples
///
/// ```
/// use mbimlink::transaction::{Transaction, TransactionError};
///
/// let (transaction, rx) = Transaction::channel();
/// transaction.complete(Err(TransactionError::Shutdown));
/// assert_eq!(rx.blocking_recv().expect("delivered"), Err(TransactionError::Shutdown));
/// ```
pub struct Transaction {
    // Never locked; the mutex only makes the boxed closure `Sync` so the
    // registry can be shared between tasks.
    completion: Mutex<Completion>,
}

impl Transaction {
    /// Wrap a completion closure.
    pub fn new(completion: impl FnOnce(Outcome) + Send + 'static) -> Self {
        Self {
            completion: Mutex::new(Box::new(completion)),
        }
    }

    /// Create a transaction whose outcome is forwarded to a oneshot channel.
    ///
    /// If the receiver has been dropped the outcome is discarded.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let transaction = Self::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        (transaction, rx)
    }

    /// Deliver the terminal outcome, consuming the transaction.
    ///
    /// A panic raised by the closure is caught and logged.
    pub fn complete(self, outcome: Outcome) {
        let completion = self
            .completion
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        crate::panic::run_callback("transaction", move || completion(outcome));
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction").finish_non_exhaustive()
    }
}
