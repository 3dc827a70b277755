//! Validated transport settings.

use std::time::Duration;

use super::{BackoffConfig, TransportError};
use crate::fragment::Fragmenter;

/// Default maximum size of one control transfer in bytes.
pub const DEFAULT_MAX_CONTROL_TRANSFER: usize = 4096;

/// Smallest control transfer a conforming device may advertise.
pub const MIN_CONTROL_TRANSFER: usize = 64;

/// Default limit on a reassembled message body in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Settings shared by the sender and the receiver.
///
/// Construct through [`TransportBuilder`](crate::transport::TransportBuilder),
/// which validates the values before a transport is started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Largest single control transfer, header included.
    pub max_control_transfer: usize,
    /// Largest message body accepted in either direction once reassembled.
    pub max_message_size: usize,
    /// Age after which an incomplete inbound message is discarded.
    pub reassembly_timeout: Duration,
    /// Perform the open handshake on start and the close handshake on shutdown.
    pub open_session: bool,
    /// Time allowed for each open or close attempt.
    pub open_timeout: Duration,
    /// Extra open attempts after a timeout.
    pub open_retries: u32,
    /// Back-off applied after transient read errors.
    pub read_backoff: BackoffConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_control_transfer: DEFAULT_MAX_CONTROL_TRANSFER,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            reassembly_timeout: Duration::from_secs(5),
            open_session: false,
            open_timeout: Duration::from_secs(5),
            open_retries: 2,
            read_backoff: BackoffConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Check the settings and normalise the back-off.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfig`] naming the first offending
    /// setting.
    pub fn validated(mut self) -> Result<Self, TransportError> {
        if self.max_control_transfer < MIN_CONTROL_TRANSFER {
            return Err(TransportError::InvalidConfig(
                "max_control_transfer must be at least 64 bytes",
            ));
        }
        if u32::try_from(self.max_control_transfer).is_err() {
            return Err(TransportError::InvalidConfig(
                "max_control_transfer must fit in 32 bits",
            ));
        }
        if self.max_message_size == 0 {
            return Err(TransportError::InvalidConfig(
                "max_message_size must be non-zero",
            ));
        }
        if self.reassembly_timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "reassembly_timeout must be non-zero",
            ));
        }
        self.read_backoff = self.read_backoff.normalized();
        Ok(self)
    }

    /// Fragmenter matching `max_control_transfer`.
    pub(crate) fn fragmenter(&self) -> Result<Fragmenter, TransportError> {
        Fragmenter::for_transfer_size(self.max_control_transfer).ok_or(
            TransportError::InvalidConfig("max_control_transfer leaves no room for payload"),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::fragment::FRAGMENT_OVERHEAD;

    #[test]
    fn defaults_are_valid() {
        let config = TransportConfig::default().validated().expect("valid");
        let fragmenter = config.fragmenter().expect("fragmenter");
        assert_eq!(
            fragmenter.max_fragment_payload().get(),
            DEFAULT_MAX_CONTROL_TRANSFER - FRAGMENT_OVERHEAD
        );
    }

    #[rstest]
    #[case(TransportConfig { max_control_transfer: 63, ..TransportConfig::default() })]
    #[case(TransportConfig { max_message_size: 0, ..TransportConfig::default() })]
    #[case(TransportConfig { reassembly_timeout: Duration::ZERO, ..TransportConfig::default() })]
    fn invalid_settings_are_rejected(#[case] config: TransportConfig) {
        assert!(matches!(
            config.validated(),
            Err(TransportError::InvalidConfig(_))
        ));
    }
}
