//! Session open and close handshakes.

use std::sync::atomic::Ordering;

use tracing::{debug, info, warn};

use super::{ExecError, Transport, TransportError};
use crate::{
    frame::Frame,
    status::Status,
    transaction::{Response, Transaction},
};

#[derive(Clone, Copy, Debug)]
enum Handshake {
    Open,
    Close,
}

impl Transport {
    /// Perform the open handshake.
    ///
    /// Each attempt waits `open_timeout`; timed-out attempts are retried up
    /// to `open_retries` more times with fresh transaction identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SessionRejected`] if the device answers
    /// with a failure status and [`TransportError::Session`] if the request
    /// could not be sent or every attempt timed out.
    pub async fn open_session(&self) -> Result<(), TransportError> {
        let attempts = self.shared.config.open_retries.saturating_add(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match self.handshake(Handshake::Open).await {
                Ok(response) if response.status() == Status::SUCCESS => {
                    self.shared.session_open.store(true, Ordering::Release);
                    info!(attempt, "control session opened");
                    return Ok(());
                }
                Ok(response) => return Err(TransportError::SessionRejected(response.status())),
                Err(err @ ExecError::Timeout(_)) => {
                    warn!(attempt, attempts, "open handshake timed out");
                    last = Some(err);
                }
                Err(err) => return Err(TransportError::Session(err)),
            }
        }
        Err(TransportError::Session(
            last.unwrap_or(ExecError::Timeout(self.shared.config.open_timeout)),
        ))
    }

    /// Perform the close handshake.
    ///
    /// The session is considered closed afterwards whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SessionRejected`] for a failure status and
    /// [`TransportError::Session`] if the request failed or timed out.
    pub async fn close_session(&self) -> Result<(), TransportError> {
        let result = self.handshake(Handshake::Close).await;
        self.shared.session_open.store(false, Ordering::Release);
        let response = result.map_err(TransportError::Session)?;
        if response.status() != Status::SUCCESS {
            return Err(TransportError::SessionRejected(response.status()));
        }
        debug!("control session closed");
        Ok(())
    }

    /// Whether the open handshake has succeeded and no close has been sent.
    #[must_use]
    pub fn is_session_open(&self) -> bool { self.shared.session_open.load(Ordering::Acquire) }

    async fn handshake(&self, kind: Handshake) -> Result<Response, ExecError> {
        let (transaction, rx) = Transaction::channel();
        let max_control_transfer = u32::try_from(self.shared.config.max_control_transfer)
            .unwrap_or(u32::MAX);
        let id = self
            .shared
            .submit(transaction, move |id| {
                let transaction_id = id.get();
                Ok(vec![match kind {
                    Handshake::Open => Frame::Open {
                        transaction_id,
                        max_control_transfer,
                    },
                    Handshake::Close => Frame::Close { transaction_id },
                }])
            })
            .await?;
        debug!(transaction_id = %id, ?kind, "handshake sent");
        self.wait(id, rx, self.shared.config.open_timeout).await
    }
}
