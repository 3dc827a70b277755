//! Parsed control messages.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{FrameError, MESSAGE_HEADER_LEN, MessageHeader, MessageType, ProtocolError};
use crate::{
    correlation::MessageKind,
    fragment::{FRAGMENT_HEADER_LEN, FragmentFrame, FragmentHeader},
    status::Status,
};

/// One control message as it appears on the wire.
///
/// Fragmented message types are surfaced as [`Frame::Fragment`]; their
/// bodies are only interpreted once every fragment has been reassembled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Open the control session.
    Open {
        /// Raw transaction identifier.
        transaction_id: u32,
        /// Largest control transfer the host will send or accept.
        max_control_transfer: u32,
    },
    /// Close the control session.
    Close {
        /// Raw transaction identifier.
        transaction_id: u32,
    },
    /// Protocol error reported by the host.
    HostError {
        /// Raw transaction identifier.
        transaction_id: u32,
        /// Reported error.
        error: ProtocolError,
    },
    /// Result of an open request.
    OpenDone {
        /// Raw transaction identifier.
        transaction_id: u32,
        /// Device status.
        status: Status,
    },
    /// Result of a close request.
    CloseDone {
        /// Raw transaction identifier.
        transaction_id: u32,
        /// Device status.
        status: Status,
    },
    /// Protocol error reported by the device.
    FunctionError {
        /// Raw transaction identifier.
        transaction_id: u32,
        /// Reported error.
        error: ProtocolError,
    },
    /// One fragment of a command, command-done or indicate-status message.
    Fragment(FragmentFrame),
}

impl Frame {
    /// Wire message type of this frame.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Open { .. } => MessageType::Open,
            Self::Close { .. } => MessageType::Close,
            Self::HostError { .. } => MessageType::HostError,
            Self::OpenDone { .. } => MessageType::OpenDone,
            Self::CloseDone { .. } => MessageType::CloseDone,
            Self::FunctionError { .. } => MessageType::FunctionError,
            Self::Fragment(fragment) => MessageType::for_fragment_kind(fragment.kind()),
        }
    }

    /// Raw transaction identifier carried in the header.
    #[must_use]
    pub const fn transaction_id(&self) -> u32 {
        match self {
            Self::Open { transaction_id, .. }
            | Self::Close { transaction_id }
            | Self::HostError { transaction_id, .. }
            | Self::OpenDone { transaction_id, .. }
            | Self::CloseDone { transaction_id, .. }
            | Self::FunctionError { transaction_id, .. } => *transaction_id,
            Self::Fragment(fragment) => fragment.transaction_id(),
        }
    }

    /// Size of the encoded message in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Close { .. } => MESSAGE_HEADER_LEN,
            Self::Fragment(fragment) => {
                MESSAGE_HEADER_LEN + FRAGMENT_HEADER_LEN + fragment.payload().len()
            }
            _ => MESSAGE_HEADER_LEN + 4,
        }
    }

    /// Parse one complete message.
    ///
    /// `message` must hold exactly the bytes declared by its header.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] when the message is truncated, its length
    /// field disagrees with `message`, or its type is unknown.
    pub fn parse(mut message: Bytes) -> Result<Self, FrameError> {
        let actual = message.len();
        let header = MessageHeader::decode(&mut message).ok_or(FrameError::Truncated {
            what: "message header",
            needed: MESSAGE_HEADER_LEN,
            available: actual,
        })?;
        let declared = header.length() as usize;
        if declared != actual {
            return Err(FrameError::LengthMismatch { declared, actual });
        }
        let message_type = header
            .message_type()
            .ok_or(FrameError::UnknownType(header.type_code()))?;
        let transaction_id = header.transaction_id();

        Ok(match message_type {
            MessageType::Close => Self::Close { transaction_id },
            MessageType::Command => {
                parse_fragment(MessageKind::Command, transaction_id, message)?
            }
            MessageType::CommandDone => {
                parse_fragment(MessageKind::Response, transaction_id, message)?
            }
            MessageType::IndicateStatus => {
                parse_fragment(MessageKind::Indication, transaction_id, message)?
            }
            MessageType::Open => Self::Open {
                transaction_id,
                max_control_transfer: field(&mut message, "open message")?,
            },
            MessageType::HostError => Self::HostError {
                transaction_id,
                error: ProtocolError::from_code(field(&mut message, "host error")?),
            },
            MessageType::OpenDone => Self::OpenDone {
                transaction_id,
                status: Status::new(field(&mut message, "open-done message")?),
            },
            MessageType::CloseDone => Self::CloseDone {
                transaction_id,
                status: Status::new(field(&mut message, "close-done message")?),
            },
            MessageType::FunctionError => Self::FunctionError {
                transaction_id,
                error: ProtocolError::from_code(field(&mut message, "function error")?),
            },
        })
    }

    /// Append the wire representation to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] if the message length does not fit
    /// the `u32` header field.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        let len = self.encoded_len();
        let length = u32::try_from(len).map_err(|_| FrameError::TooLarge(len))?;
        dst.reserve(len);
        MessageHeader::new(self.message_type(), length, self.transaction_id()).encode(dst);
        match self {
            Self::Open {
                max_control_transfer,
                ..
            } => dst.put_u32_le(*max_control_transfer),
            Self::Close { .. } => {}
            Self::HostError { error, .. } | Self::FunctionError { error, .. } => {
                dst.put_u32_le(error.code());
            }
            Self::OpenDone { status, .. } | Self::CloseDone { status, .. } => {
                dst.put_u32_le(status.get());
            }
            Self::Fragment(fragment) => {
                fragment.header().encode(dst);
                dst.put_slice(fragment.payload());
            }
        }
        Ok(())
    }
}

fn parse_fragment(
    kind: MessageKind,
    transaction_id: u32,
    mut rest: Bytes,
) -> Result<Frame, FrameError> {
    let available = rest.len();
    let header = FragmentHeader::decode(&mut rest).ok_or(FrameError::Truncated {
        what: "fragment header",
        needed: FRAGMENT_HEADER_LEN,
        available,
    })?;
    Ok(Frame::Fragment(FragmentFrame::new(
        kind,
        transaction_id,
        header,
        rest,
    )))
}

fn field(rest: &mut Bytes, what: &'static str) -> Result<u32, FrameError> {
    if rest.remaining() < 4 {
        return Err(FrameError::Truncated {
            what,
            needed: MESSAGE_HEADER_LEN + 4,
            available: MESSAGE_HEADER_LEN + rest.remaining(),
        });
    }
    Ok(rest.get_u32_le())
}
