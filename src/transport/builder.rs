//! Builder for [`Transport`].

use std::{path::Path, time::Duration};

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::{
    BackoffConfig,
    CharDevice,
    ErrorCallback,
    Transport,
    TransportConfig,
    TransportError,
};

/// Configures and starts a [`Transport`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use mbimlink::transport::Transport;
///
/// # async fn run() -> Result<(), mbimlink::transport::TransportError> {
/// let transport = Transport::builder()
///     .max_control_transfer(4096)
///     .open_session(true)
///     .open_timeout(Duration::from_secs(2))
///     .connect("/dev/cdc-wdm0")
///     .await?;
/// transport.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
#[must_use]
pub struct TransportBuilder {
    config: TransportConfig,
    on_error: Option<ErrorCallback>,
}

impl std::fmt::Debug for TransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportBuilder")
            .field("config", &self.config)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl TransportBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self { Self::default() }

    /// Start from an existing configuration.
    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            config,
            on_error: None,
        }
    }

    /// Largest single control transfer, header included.
    pub fn max_control_transfer(mut self, bytes: usize) -> Self {
        self.config.max_control_transfer = bytes;
        self
    }

    /// Largest message body accepted once reassembled or sent.
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.config.max_message_size = bytes;
        self
    }

    /// Age after which an incomplete inbound message is discarded.
    pub fn reassembly_timeout(mut self, timeout: Duration) -> Self {
        self.config.reassembly_timeout = timeout;
        self
    }

    /// Perform the open handshake on start and the close handshake on shutdown.
    pub fn open_session(mut self, enabled: bool) -> Self {
        self.config.open_session = enabled;
        self
    }

    /// Time allowed for each handshake attempt.
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    /// Extra open attempts after a timeout.
    pub fn open_retries(mut self, retries: u32) -> Self {
        self.config.open_retries = retries;
        self
    }

    /// Back-off applied after transient read errors.
    pub fn read_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.read_backoff = backoff;
        self
    }

    /// Initial error callback. It can be replaced later with
    /// [`Transport::register_error_callback`].
    pub fn on_error(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// Open the character device at `path` and start the transport on it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::DeviceOpen`] if the device cannot be opened,
    /// and otherwise the errors of [`build`](Self::build).
    pub async fn connect(self, path: impl AsRef<Path>) -> Result<Transport, TransportError> {
        let path = path.as_ref();
        let device = CharDevice::open(path).map_err(|source| TransportError::DeviceOpen {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "control device opened");
        self.build(device).await
    }

    /// Start the transport on an already-open stream.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfig`] for out-of-range settings,
    /// [`TransportError::Allocation`] if the reassembly buffer cannot be
    /// reserved, and the handshake errors of
    /// [`Transport::open_session`] when `open_session` is enabled. A
    /// transport whose handshake failed is shut down before returning.
    pub async fn build<IO>(self, io: IO) -> Result<Transport, TransportError>
    where
        IO: AsyncRead + AsyncWrite + Send + 'static,
    {
        let config = self.config.validated()?;
        let open_session = config.open_session;
        let transport = Transport::start(config, io, self.on_error)?;
        if open_session {
            if let Err(err) = transport.open_session().await {
                warn!(error = %err, "open handshake failed");
                transport.shutdown().await;
                return Err(err);
            }
        }
        Ok(transport)
    }
}
