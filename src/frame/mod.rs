//! MBIM control message framing.
//!
//! Every control message starts with a 12-byte [`MessageHeader`]. Command,
//! command-done and indicate-status messages continue with a
//! [`FragmentHeader`](crate::fragment::FragmentHeader) and a fragment of the
//! message body; the remaining message types carry a single fixed field.
//! [`MessageCodec`] splits a byte stream into [`Frame`]s and writes them back.

pub mod body;
pub mod codec;
pub mod error;
pub mod header;
pub mod message;

pub use body::{
    COMMAND_DONE_PREFIX_LEN,
    COMMAND_PREFIX_LEN,
    CommandBody,
    CommandDoneBody,
    INDICATION_PREFIX_LEN,
    IndicationBody,
};
pub use codec::MessageCodec;
pub use error::{FrameError, ProtocolError};
pub use header::{MessageHeader, MessageType};
pub use message::Frame;

/// Size in bytes of the header that starts every control message.
pub const MESSAGE_HEADER_LEN: usize = 12;
