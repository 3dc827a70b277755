//! Error types for the framing layer.
//!
//! [`FrameError`] describes messages the codec could not interpret. Apart
//! from [`FrameError::Io`], every variant concerns a single message that has
//! already been consumed from the stream, so the caller may keep decoding.
//! [`ProtocolError`] is the error code carried by `FUNCTION_ERROR` and
//! `HOST_ERROR` messages.

use std::io;

use thiserror::Error;

/// Failures raised while framing or parsing a control message.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The message ended before a required field.
    #[error("{what} needs {needed} bytes but only {available} are present")]
    Truncated {
        /// Field or structure being read.
        what: &'static str,
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// The header declares a length smaller than the header itself.
    #[error("message declares length {declared}; discarded {discarded} buffered bytes")]
    InvalidLength {
        /// Length carried by the header.
        declared: usize,
        /// Buffered bytes thrown away to resynchronise.
        discarded: usize,
    },

    /// The header length disagrees with the bytes framed for the message.
    #[error("message declares {declared} bytes but {actual} were framed")]
    LengthMismatch {
        /// Length carried by the header.
        declared: usize,
        /// Bytes handed to the parser.
        actual: usize,
    },

    /// The header declares a length above the configured transfer limit.
    #[error("message of {declared} bytes exceeds the {limit} byte transfer limit")]
    Oversized {
        /// Length carried by the header.
        declared: usize,
        /// Maximum accepted length.
        limit: usize,
    },

    /// The message type code is not one this crate understands.
    #[error("unknown message type {0:#010x}")]
    UnknownType(u32),

    /// A command carried an unknown command type.
    #[error("unknown command type {0}")]
    UnknownCommandType(u32),

    /// The information buffer length disagrees with the bytes present.
    #[error("information buffer declares {declared} bytes but {available} are present")]
    BufferLength {
        /// Length carried in the body prefix.
        declared: usize,
        /// Bytes following the prefix.
        available: usize,
    },

    /// The outbound message does not fit the `u32` length field.
    #[error("message of {0} bytes is too large to encode")]
    TooLarge(usize),

    /// The underlying stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Protocol-level error code carried by error messages.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum ProtocolError {
    /// A fragment did not arrive in time.
    #[error("fragment timeout")]
    TimeoutFragment,
    /// A fragment arrived out of sequence.
    #[error("fragment out of sequence")]
    FragmentOutOfSequence,
    /// A message length did not match its content.
    #[error("length mismatch")]
    LengthMismatch,
    /// A transaction identifier was reused while still in flight.
    #[error("duplicated transaction id")]
    DuplicatedTid,
    /// A command arrived before the session was opened.
    #[error("session not opened")]
    NotOpened,
    /// Unspecified failure.
    #[error("unknown error")]
    Unknown,
    /// The transaction was cancelled.
    #[error("cancelled")]
    Cancel,
    /// The maximum control transfer size was exceeded.
    #[error("max transfer exceeded")]
    MaxTransfer,
    /// Code outside the published range.
    #[error("unrecognised error code {0:#x}")]
    Other(u32),
}

impl ProtocolError {
    /// Interpret a wire error code.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::TimeoutFragment,
            2 => Self::FragmentOutOfSequence,
            3 => Self::LengthMismatch,
            4 => Self::DuplicatedTid,
            5 => Self::NotOpened,
            6 => Self::Unknown,
            7 => Self::Cancel,
            8 => Self::MaxTransfer,
            other => Self::Other(other),
        }
    }

    /// Wire code for this error.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::TimeoutFragment => 1,
            Self::FragmentOutOfSequence => 2,
            Self::LengthMismatch => 3,
            Self::DuplicatedTid => 4,
            Self::NotOpened => 5,
            Self::Unknown => 6,
            Self::Cancel => 7,
            Self::MaxTransfer => 8,
            Self::Other(code) => code,
        }
    }
}
