//! Error types for transport operations.

use std::{collections::TryReserveError, io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::{correlation::TransactionId, status::Status, transaction::TransactionError};

/// Errors raised while bringing a transport up.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device node could not be opened.
    #[error("failed to open device {}: {source}", path.display())]
    DeviceOpen {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The reassembly buffer could not be allocated.
    #[error("failed to allocate reassembly buffer")]
    Allocation(#[from] TryReserveError),
    /// A configuration value is out of range.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(&'static str),
    /// The session handshake could not be completed.
    #[error("session handshake failed")]
    Session(#[source] ExecError),
    /// The device answered the session handshake with a failure status.
    #[error("device rejected session handshake with status {0}")]
    SessionRejected(Status),
}

/// Errors returned by [`send`](crate::transport::Transport::send).
///
/// When `send` fails the transaction has not been left registered and its
/// completion will not run.
#[derive(Debug, Error)]
pub enum SendError {
    /// Writing to the device failed.
    #[error("write to device failed: {0}")]
    Write(#[source] io::Error),
    /// The device has been removed; nothing was written.
    #[error("device has been removed")]
    DeviceRemoved,
    /// The transport has been shut down; nothing was written.
    #[error("transport is shut down")]
    Closed,
    /// The encoded command exceeds the configured message limit.
    #[error("command of {len} bytes exceeds the {max} byte message limit")]
    PayloadTooLarge {
        /// Encoded command length.
        len: usize,
        /// Configured limit.
        max: usize,
    },
    /// The allocated identifier was already registered.
    #[error("transaction {0} is already registered")]
    DuplicateTransaction(TransactionId),
    /// Every identifier probed was still in use.
    #[error("no free transaction identifier")]
    IdsExhausted,
}

/// Errors returned by the request-and-wait helpers.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command could not be sent.
    #[error(transparent)]
    Send(#[from] SendError),
    /// No response arrived in time; the transaction was cancelled.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// The transaction ended without a device response.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// The transaction was dropped without an outcome.
    #[error("transaction abandoned without an outcome")]
    Abandoned,
    /// The device answered with a failure status.
    #[error("device returned status {0}")]
    Status(Status),
    /// The response payload could not be decoded.
    #[error("failed to decode response payload")]
    Parse(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ExecError {
    /// Map the error onto the status vocabulary reported to callers.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use mbimlink::{status::Status, transaction::TransactionError, transport::ExecError};
    ///
    /// assert_eq!(ExecError::Timeout(Duration::from_secs(1)).status(), Status::READ_FAILURE);
    /// assert_eq!(ExecError::Abandoned.status(), Status::FAILURE);
    /// assert_eq!(
    ///     ExecError::from(TransactionError::Malformed).status(),
    ///     Status::PARSE_FAILURE
    /// );
    /// ```
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::Timeout(_) => Status::READ_FAILURE,
            Self::Send(SendError::Write(_)) => Status::WRITE_FAILURE,
            Self::Send(SendError::PayloadTooLarge { .. }) => Status::INVALID_PARAMETERS,
            Self::Parse(_) | Self::Transaction(TransactionError::Malformed) => {
                Status::PARSE_FAILURE
            }
            Self::Status(status) => *status,
            Self::Send(_) | Self::Transaction(_) | Self::Abandoned => Status::FAILURE,
        }
    }
}
