//! Request-and-wait helpers layered on [`Transport::send`].

use std::{error::Error, time::Duration};

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::debug;

use super::{ExecError, Transport};
use crate::{
    correlation::TransactionId,
    metrics,
    service::ServiceId,
    status::{CommandType, Status},
    transaction::{Outcome, Response, Transaction},
};

impl Transport {
    /// Send a command and wait up to `timeout` for its response.
    ///
    /// Each call waits on its own channel, so any number of callers may run
    /// concurrently. On timeout the transaction is cancelled locally; the
    /// device is not told and may still act on the command.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Send`] without waiting if the command could not
    /// be sent, [`ExecError::Timeout`] if no response arrived in time, and
    /// [`ExecError::Transaction`] if the transaction ended without a device
    /// response. A device failure status is returned inside the
    /// [`Response`], not as an error.
    pub async fn execute_and_wait(
        &self,
        service: ServiceId,
        cid: u32,
        command_type: CommandType,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Response, ExecError> {
        let (transaction, rx) = Transaction::channel();
        let id = self
            .send(service, cid, command_type, payload, transaction)
            .await?;
        self.wait(id, rx, timeout).await
    }

    /// Like [`execute_and_wait`](Self::execute_and_wait), then decode a
    /// successful response's payload with `decode`.
    ///
    /// # Errors
    ///
    /// As for [`execute_and_wait`](Self::execute_and_wait); additionally
    /// returns [`ExecError::Status`] for a non-success status, in which case
    /// `decode` is not called, and [`ExecError::Parse`] if `decode` fails.
    pub async fn execute_and_decode<T, E>(
        &self,
        service: ServiceId,
        cid: u32,
        command_type: CommandType,
        payload: Bytes,
        timeout: Duration,
        decode: impl FnOnce(Bytes) -> Result<T, E>,
    ) -> Result<T, ExecError>
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let response = self
            .execute_and_wait(service, cid, command_type, payload, timeout)
            .await?;
        if response.status() != Status::SUCCESS {
            return Err(ExecError::Status(response.status()));
        }
        decode(response.into_payload()).map_err(|err| ExecError::Parse(err.into()))
    }

    pub(super) async fn wait(
        &self,
        id: TransactionId,
        mut rx: oneshot::Receiver<Outcome>,
        timeout: Duration,
    ) -> Result<Response, ExecError> {
        let outcome = match tokio::time::timeout(timeout, &mut rx).await {
            Ok(received) => received,
            Err(_elapsed) => {
                if self.cancel(id) {
                    debug!(transaction_id = %id, ?timeout, "transaction timed out");
                    metrics::inc_timeouts();
                    return Err(ExecError::Timeout(timeout));
                }
                // The receiver removed the transaction first, so its outcome
                // is already on the way.
                debug!(transaction_id = %id, "response raced the timeout");
                rx.await
            }
        };
        outcome
            .map_err(|_| ExecError::Abandoned)?
            .map_err(ExecError::from)
    }
}
