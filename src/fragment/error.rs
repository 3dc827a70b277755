//! Error and status types emitted by the fragmentation layer.
//!
//! Sequencing failures are recoverable: the receiver drops the affected
//! message and keeps running. The variants carry enough detail for the
//! warning logs and for behavioural tests to tell the cases apart.

use thiserror::Error;

use crate::correlation::CorrelationKey;

/// Result of feeding a fragment into a [`FragmentSeries`](crate::fragment::FragmentSeries).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentStatus {
    /// The logical message still expects more fragments.
    Incomplete,
    /// The fragment completed the logical message.
    Complete,
}

/// Sequencing errors produced by [`FragmentSeries`](crate::fragment::FragmentSeries).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentError {
    /// The header declares an index outside its own total.
    #[error("invalid fragment header: index {current} of {total}")]
    InvalidHeader { current: u32, total: u32 },
    /// A fragment disagrees with the total declared by the first fragment.
    #[error("fragment total mismatch: expected {expected}, found {found}")]
    TotalMismatch { expected: u32, found: u32 },
    /// A fragment arrived out of order or was repeated.
    #[error("fragment index mismatch: expected {expected}, found {found}")]
    IndexMismatch { expected: u32, found: u32 },
    /// The series already consumed its final fragment.
    #[error("fragment series already complete")]
    SeriesComplete,
}

/// Errors produced while splitting an outbound message.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentationError {
    /// The message needs more fragments than the header can count.
    #[error("message of {len} bytes needs more than u32::MAX fragments")]
    TooManyFragments { len: usize },
}

/// Errors produced by the [`Reassembler`](crate::fragment::Reassembler).
///
/// Every variant means the partial message for `key` has been discarded.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The fragment violated sequencing rules.
    #[error("fragment sequencing error for {key}: {source}")]
    Fragment {
        key: CorrelationKey,
        #[source]
        source: FragmentError,
    },
    /// A continuation fragment arrived with no message in progress.
    #[error("fragment {current} for {key} has no message in progress")]
    MissingStart { key: CorrelationKey, current: u32 },
    /// The reassembled payload would exceed the configured limit.
    #[error("message {key} too large: attempted {attempted} bytes, limit {limit}")]
    MessageTooLarge {
        key: CorrelationKey,
        attempted: usize,
        limit: usize,
    },
}

impl ReassemblyError {
    /// Correlation key of the discarded message.
    #[must_use]
    pub const fn key(&self) -> CorrelationKey {
        match self {
            Self::Fragment { key, .. }
            | Self::MissingStart { key, .. }
            | Self::MessageTooLarge { key, .. } => *key,
        }
    }
}
