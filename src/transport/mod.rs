//! The control transport engine.
//!
//! A [`Transport`] owns the device, a background receiver task, and the
//! transaction and indicator registries. Commands are encoded, fragmented
//! and written under a single write lock; the receiver reassembles inbound
//! fragments and either completes the matching transaction or fans the
//! indication out to subscribers.
//!
//! Locks are never nested. The write lock guards only the device writer;
//! registries and the error callback slot have their own locks and no
//! callback runs while any of them is held.

use std::{
    fmt,
    path::Path,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    task::JoinHandle,
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, warn};

use crate::{
    correlation::{MessageKind, TransactionId, TransactionIdAllocator},
    fragment::Fragmenter,
    frame::{COMMAND_PREFIX_LEN, CommandBody, Frame},
    indicator::{Indication, IndicatorId, IndicatorRegistry, ServiceFilter},
    metrics,
    service::ServiceId,
    status::CommandType,
    transaction::{Transaction, TransactionError, TransactionRegistry},
};

mod backoff;
mod builder;
mod config;
mod device;
mod error;
mod fault;
mod receiver;
mod session;
mod sync;

pub use backoff::BackoffConfig;
pub use builder::TransportBuilder;
pub use config::{
    DEFAULT_MAX_CONTROL_TRANSFER,
    DEFAULT_MAX_MESSAGE_SIZE,
    MIN_CONTROL_TRANSFER,
    TransportConfig,
};
pub use device::CharDevice;
pub use error::{ExecError, SendError, TransportError};
pub use fault::{TransportFault, is_removal};

/// Callback notified of device faults.
pub type ErrorCallback = Arc<dyn Fn(&TransportFault) + Send + Sync>;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub(crate) struct Shared {
    config: TransportConfig,
    fragmenter: Fragmenter,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    ids: TransactionIdAllocator,
    transactions: TransactionRegistry,
    indicators: IndicatorRegistry,
    error_callback: Mutex<Option<ErrorCallback>>,
    removed: AtomicBool,
    shutting_down: AtomicBool,
    closed: AtomicBool,
    session_open: AtomicBool,
    stop: CancellationToken,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    /// Report `fault` to the registered error callback, if any.
    pub(crate) fn notify(&self, fault: &TransportFault) {
        metrics::inc_faults(fault.label());
        let callback = lock(&self.error_callback).clone();
        if let Some(callback) = callback {
            crate::panic::run_callback("error", || callback(fault));
        }
    }

    /// Record that the device is gone.
    ///
    /// Only the first call has any effect: it stops the receiver, notifies
    /// the error callback, and fails every pending transaction.
    pub(crate) fn mark_removed(&self, errno: Option<i32>) {
        if self.removed.swap(true, Ordering::AcqRel) {
            return;
        }
        error!(?errno, "control device removed");
        self.stop.cancel();
        self.notify(&TransportFault::DeviceRemoved { errno });
        self.fail_pending(TransactionError::DeviceRemoved);
    }

    fn fail_pending(&self, reason: TransactionError) {
        let pending = self.transactions.drain();
        metrics::set_pending(self.transactions.len());
        for (id, transaction) in pending {
            debug!(transaction_id = %id, %reason, "failing pending transaction");
            transaction.complete(Err(reason));
        }
    }

    fn register(&self, transaction: Transaction) -> Result<TransactionId, SendError> {
        let id = self
            .ids
            .allocate(|candidate| self.transactions.contains(candidate))
            .ok_or(SendError::IdsExhausted)?;
        self.transactions
            .insert(id, transaction)
            .map_err(|_| SendError::DuplicateTransaction(id))?;
        metrics::set_pending(self.transactions.len());
        Ok(id)
    }

    fn ensure_usable(&self) -> Result<(), SendError> {
        if self.removed.load(Ordering::Acquire) {
            return Err(SendError::DeviceRemoved);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(SendError::Closed);
        }
        Ok(())
    }

    /// Register `transaction`, then write the messages built for its id.
    ///
    /// Every message is written while holding the write lock, so fragments
    /// of different commands never interleave on the device.
    async fn submit(
        &self,
        transaction: Transaction,
        build: impl FnOnce(TransactionId) -> Result<Vec<Frame>, SendError>,
    ) -> Result<TransactionId, SendError> {
        self.ensure_usable()?;
        let id = self.register(transaction)?;
        if let Err(err) = self.ensure_usable() {
            // Removal or shutdown raced the insert. If its drain already
            // completed the transaction, the caller has its terminal outcome.
            return if self.deregister(id) { Err(err) } else { Ok(id) };
        }

        let messages = match build(id).and_then(|frames| encode_all(&frames)) {
            Ok(messages) => messages,
            Err(err) => {
                self.deregister(id);
                return Err(err);
            }
        };

        let mut writer = self.writer.lock().await;
        let Some(device) = writer.as_mut() else {
            drop(writer);
            self.deregister(id);
            return Err(SendError::Closed);
        };
        for message in &messages {
            if let Err(err) = device.write_all(message).await {
                drop(writer);
                return Err(self.write_failed(id, err));
            }
            metrics::inc_frames(metrics::Direction::Outbound);
        }
        if let Err(err) = device.flush().await {
            drop(writer);
            return Err(self.write_failed(id, err));
        }
        drop(writer);

        debug!(transaction_id = %id, messages = messages.len(), "request written");
        Ok(id)
    }

    /// Withdraw `id` without completing it. Returns `false` if something
    /// else removed it first.
    fn deregister(&self, id: TransactionId) -> bool {
        let withdrawn = self.transactions.remove(id).is_some();
        metrics::set_pending(self.transactions.len());
        withdrawn
    }

    fn write_failed(&self, id: TransactionId, err: std::io::Error) -> SendError {
        warn!(transaction_id = %id, error = %err, "write to control device failed");
        self.deregister(id);
        if is_removal(&err) {
            self.mark_removed(err.raw_os_error());
        } else {
            self.notify(&TransportFault::write(&err));
        }
        SendError::Write(err)
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("config", &self.config)
            .field("pending", &self.transactions.len())
            .field("indicators", &self.indicators.len())
            .field("removed", &self.removed.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn encode_all(frames: &[Frame]) -> Result<Vec<Bytes>, SendError> {
    frames
        .iter()
        .map(|frame| {
            let mut buf = BytesMut::with_capacity(frame.encoded_len());
            frame
                .encode(&mut buf)
                .map(|()| buf.freeze())
                .map_err(|_| SendError::PayloadTooLarge {
                    len: frame.encoded_len(),
                    max: u32::MAX as usize,
                })
        })
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running control transport.
///
/// Cloning is cheap; all clones drive the same device. Dropping the last
/// clone stops the receiver, but only [`shutdown`](Self::shutdown) closes
/// the session and completes pending transactions.
#[derive(Clone)]
pub struct Transport {
    shared: Arc<Shared>,
    _stop_on_drop: Arc<DropGuard>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Create a builder with default settings.
    #[must_use]
    pub fn builder() -> TransportBuilder { TransportBuilder::new() }

    /// Open the device at `path` and start the receiver with default
    /// settings and a `max_expected_payload` byte message limit.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::DeviceOpen`] if the device cannot be opened
    /// and [`TransportError::Allocation`] if the reassembly buffer cannot be
    /// reserved.
    pub async fn initialize(
        path: impl AsRef<Path>,
        max_expected_payload: usize,
    ) -> Result<Self, TransportError> {
        TransportBuilder::new()
            .max_message_size(max_expected_payload)
            .connect(path)
            .await
    }

    pub(crate) fn start<IO>(
        config: TransportConfig,
        io: IO,
        on_error: Option<ErrorCallback>,
    ) -> Result<Self, TransportError>
    where
        IO: AsyncRead + AsyncWrite + Send + 'static,
    {
        let fragmenter = config.fragmenter()?;
        let reassembler = receiver::reassembler(&config)?;
        let (reader, writer) = tokio::io::split(io);
        let stop = CancellationToken::new();

        let shared = Arc::new(Shared {
            fragmenter,
            writer: tokio::sync::Mutex::new(Some(Box::new(writer))),
            ids: TransactionIdAllocator::default(),
            transactions: TransactionRegistry::default(),
            indicators: IndicatorRegistry::default(),
            error_callback: Mutex::new(on_error),
            removed: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            session_open: AtomicBool::new(false),
            stop: stop.clone(),
            receiver: Mutex::new(None),
            config,
        });

        let handle = tokio::spawn(receiver::run(
            Arc::clone(&shared),
            Box::new(reader),
            reassembler,
        ));
        *lock(&shared.receiver) = Some(handle);

        Ok(Self {
            shared,
            _stop_on_drop: Arc::new(stop.drop_guard()),
        })
    }

    /// Settings the transport runs with.
    #[must_use]
    pub fn config(&self) -> &TransportConfig { &self.shared.config }

    /// Send a command and register `transaction` for its response.
    ///
    /// The transaction is registered before the first byte is written, so a
    /// response cannot overtake the registration. Returns the identifier the
    /// command was sent under.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] without writing anything if the device has been
    /// removed, the transport is shut down, or the command is too large. A
    /// failed write returns [`SendError::Write`]. In every error case the
    /// transaction is dropped without its completion running.
    pub async fn send(
        &self,
        service: ServiceId,
        cid: u32,
        command_type: CommandType,
        payload: Bytes,
        transaction: Transaction,
    ) -> Result<TransactionId, SendError> {
        self.shared.ensure_usable()?;
        let max = self.shared.config.max_message_size;
        let len = COMMAND_PREFIX_LEN.saturating_add(payload.len());
        if len > max {
            return Err(SendError::PayloadTooLarge { len, max });
        }
        let body = CommandBody {
            service,
            cid,
            command_type,
            buffer: payload,
        }
        .encode()
        .map_err(|_| SendError::PayloadTooLarge { len, max })?;

        let fragmenter = self.shared.fragmenter;
        self.shared
            .submit(transaction, move |id| {
                let batch = fragmenter
                    .fragment(MessageKind::Command, id.get(), body)
                    .map_err(|_| SendError::PayloadTooLarge { len, max })?;
                Ok(batch.into_iter().map(Frame::Fragment).collect())
            })
            .await
    }

    /// Remove a pending transaction without running its completion.
    ///
    /// Returns `false` if the transaction had already completed, been
    /// cancelled, or never existed. Nothing is sent to the device.
    pub fn cancel(&self, id: TransactionId) -> bool {
        let cancelled = self.shared.transactions.remove(id).is_some();
        if cancelled {
            metrics::set_pending(self.shared.transactions.len());
            debug!(transaction_id = %id, "transaction cancelled");
        }
        cancelled
    }

    /// Register `handler` for indications passing `filter`.
    ///
    /// Handlers run on the receiver task and may unsubscribe themselves.
    pub fn subscribe(
        &self,
        filter: ServiceFilter,
        handler: impl Fn(&Indication) + Send + Sync + 'static,
    ) -> IndicatorId {
        self.shared.indicators.subscribe(filter, handler)
    }

    /// Remove an indication subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: IndicatorId) -> bool { self.shared.indicators.unsubscribe(id) }

    /// Replace the error callback. `None` disables fault notification.
    ///
    /// Only the most recently registered callback is ever invoked.
    pub fn register_error_callback(&self, callback: Option<ErrorCallback>) {
        *lock(&self.shared.error_callback) = callback;
    }

    /// Number of transactions awaiting a response.
    #[must_use]
    pub fn pending_transactions(&self) -> usize { self.shared.transactions.len() }

    /// Whether device removal has been detected.
    #[must_use]
    pub fn is_device_removed(&self) -> bool { self.shared.removed.load(Ordering::Acquire) }

    /// Whether [`shutdown`](Self::shutdown) has completed or is in progress.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.shared.closed.load(Ordering::Acquire) }

    /// Stop the transport.
    ///
    /// Closes an open session (best effort), signals and joins the receiver,
    /// closes the device, and completes every still-pending transaction
    /// with [`TransactionError::Shutdown`]. Later calls return immediately.
    pub async fn shutdown(&self) {
        if self.shared.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.shared.session_open.load(Ordering::Acquire) && !self.is_device_removed() {
            if let Err(err) = self.close_session().await {
                debug!(error = %err, "close handshake failed during shutdown");
            }
        }
        self.shared.closed.store(true, Ordering::Release);
        self.shared.stop.cancel();

        let handle = lock(&self.shared.receiver).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "receiver task ended abnormally");
            }
        }

        let writer = self.shared.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(err) = writer.shutdown().await {
                debug!(error = %err, "closing control device failed");
            }
        }

        self.shared.fail_pending(TransactionError::Shutdown);
        debug!("transport shut down");
    }
}

#[cfg(test)]
mod tests;
