//! Faults reported through the error callback.

use std::{fmt, io};

/// Device-level failure observed by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportFault {
    /// The device went away. Reported at most once per transport.
    DeviceRemoved {
        /// OS error number, if the removal surfaced as an error.
        errno: Option<i32>,
    },
    /// A read failed; the receiver retries after a back-off.
    Read {
        /// Error classification.
        kind: io::ErrorKind,
        /// OS error number, if any.
        errno: Option<i32>,
    },
    /// A write failed; the affected `send` returned an error.
    Write {
        /// Error classification.
        kind: io::ErrorKind,
        /// OS error number, if any.
        errno: Option<i32>,
    },
}

impl TransportFault {
    pub(crate) fn read(err: &io::Error) -> Self {
        Self::Read {
            kind: err.kind(),
            errno: err.raw_os_error(),
        }
    }

    pub(crate) fn write(err: &io::Error) -> Self {
        Self::Write {
            kind: err.kind(),
            errno: err.raw_os_error(),
        }
    }

    /// Short label used for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::DeviceRemoved { .. } => "removed",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
        }
    }

    /// OS error number carried by the fault.
    #[must_use]
    pub const fn errno(&self) -> Option<i32> {
        match self {
            Self::DeviceRemoved { errno } | Self::Read { errno, .. } | Self::Write { errno, .. } => {
                *errno
            }
        }
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceRemoved { errno: Some(errno) } => {
                write!(f, "device removed (errno {errno})")
            }
            Self::DeviceRemoved { errno: None } => f.write_str("device removed"),
            Self::Read { kind, .. } => write!(f, "read failed: {kind}"),
            Self::Write { kind, .. } => write!(f, "write failed: {kind}"),
        }
    }
}

/// Whether `err` means the device is gone rather than temporarily failing.
#[must_use]
pub fn is_removal(err: &io::Error) -> bool {
    if matches!(
        err.raw_os_error(),
        Some(libc::ENODEV | libc::ENXIO | libc::ESHUTDOWN | libc::EPIPE)
    ) {
        return true;
    }
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use std::io;

    use rstest::rstest;

    use super::{TransportFault, is_removal};

    #[rstest]
    #[case(io::Error::from_raw_os_error(libc::ENODEV), true)]
    #[case(io::Error::from_raw_os_error(libc::ENXIO), true)]
    #[case(io::Error::from_raw_os_error(libc::ESHUTDOWN), true)]
    #[case(io::Error::from_raw_os_error(libc::EPIPE), true)]
    #[case(io::Error::from(io::ErrorKind::BrokenPipe), true)]
    #[case(io::Error::from(io::ErrorKind::NotConnected), true)]
    #[case(io::Error::from_raw_os_error(libc::EIO), false)]
    #[case(io::Error::from_raw_os_error(libc::EAGAIN), false)]
    #[case(io::Error::other("glitch"), false)]
    fn removal_classification(#[case] err: io::Error, #[case] removal: bool) {
        assert_eq!(is_removal(&err), removal);
    }

    #[test]
    fn faults_carry_errno() {
        let fault = TransportFault::write(&io::Error::from_raw_os_error(libc::EIO));
        assert_eq!(fault.errno(), Some(libc::EIO));
        assert_eq!(fault.label(), "write");
        assert_eq!(TransportFault::DeviceRemoved { errno: None }.to_string(), "device removed");
    }
}
