//! Message type codes and the common message header.

use std::fmt;

use bytes::{Buf, BufMut};

use super::MESSAGE_HEADER_LEN;
use crate::correlation::MessageKind;

/// Control message types defined by MBIM 1.0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Host request to open the control session.
    Open,
    /// Host request to close the control session.
    Close,
    /// Host command for a device service.
    Command,
    /// Host-side protocol error report.
    HostError,
    /// Device answer to [`MessageType::Open`].
    OpenDone,
    /// Device answer to [`MessageType::Close`].
    CloseDone,
    /// Device answer to [`MessageType::Command`].
    CommandDone,
    /// Device-side protocol error report.
    FunctionError,
    /// Unsolicited device notification.
    IndicateStatus,
}

impl MessageType {
    /// Wire code for this message type.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Open => 0x0000_0001,
            Self::Close => 0x0000_0002,
            Self::Command => 0x0000_0003,
            Self::HostError => 0x0000_0004,
            Self::OpenDone => 0x8000_0001,
            Self::CloseDone => 0x8000_0002,
            Self::CommandDone => 0x8000_0003,
            Self::FunctionError => 0x8000_0004,
            Self::IndicateStatus => 0x8000_0007,
        }
    }

    /// Look up a message type by wire code.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0x0000_0001 => Self::Open,
            0x0000_0002 => Self::Close,
            0x0000_0003 => Self::Command,
            0x0000_0004 => Self::HostError,
            0x8000_0001 => Self::OpenDone,
            0x8000_0002 => Self::CloseDone,
            0x8000_0003 => Self::CommandDone,
            0x8000_0004 => Self::FunctionError,
            0x8000_0007 => Self::IndicateStatus,
            _ => return None,
        })
    }

    /// Kind of fragmented message this type carries, if it is fragmented.
    #[must_use]
    pub const fn fragment_kind(self) -> Option<MessageKind> {
        match self {
            Self::Command => Some(MessageKind::Command),
            Self::CommandDone => Some(MessageKind::Response),
            Self::IndicateStatus => Some(MessageKind::Indication),
            _ => None,
        }
    }

    /// Message type used on the wire for a fragmented message kind.
    #[must_use]
    pub const fn for_fragment_kind(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Command => Self::Command,
            MessageKind::Response => Self::CommandDone,
            MessageKind::Indication => Self::IndicateStatus,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Command => "command",
            Self::HostError => "host-error",
            Self::OpenDone => "open-done",
            Self::CloseDone => "close-done",
            Self::CommandDone => "command-done",
            Self::FunctionError => "function-error",
            Self::IndicateStatus => "indicate-status",
        })
    }
}

/// Header present at the start of every control message.
///
/// `length` covers the whole message including this header. The raw type
/// code is kept so that unknown message types can still be framed and
/// skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    message_type: u32,
    length: u32,
    transaction_id: u32,
}

impl MessageHeader {
    /// Construct a header.
    #[must_use]
    pub const fn new(message_type: MessageType, length: u32, transaction_id: u32) -> Self {
        Self {
            message_type: message_type.code(),
            length,
            transaction_id,
        }
    }

    /// Decoded message type, or `None` for an unrecognised code.
    #[must_use]
    pub const fn message_type(&self) -> Option<MessageType> {
        MessageType::from_code(self.message_type)
    }

    /// Raw message type code.
    #[must_use]
    pub const fn type_code(&self) -> u32 { self.message_type }

    /// Declared length of the whole message.
    #[must_use]
    pub const fn length(&self) -> u32 { self.length }

    /// Raw transaction identifier.
    #[must_use]
    pub const fn transaction_id(&self) -> u32 { self.transaction_id }

    /// Append the wire representation to `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.message_type);
        dst.put_u32_le(self.length);
        dst.put_u32_le(self.transaction_id);
    }

    /// Read a header from the front of `src`, advancing it.
    ///
    /// Returns `None` when fewer than [`MESSAGE_HEADER_LEN`] bytes remain.
    pub fn decode(src: &mut impl Buf) -> Option<Self> {
        if src.remaining() < MESSAGE_HEADER_LEN {
            return None;
        }
        Some(Self {
            message_type: src.get_u32_le(),
            length: src.get_u32_le(),
            transaction_id: src.get_u32_le(),
        })
    }

    /// Read a header from the front of `src` without consuming it.
    #[must_use]
    pub fn peek(mut src: &[u8]) -> Option<Self> { Self::decode(&mut src) }
}
