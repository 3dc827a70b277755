//! Bodies of fragmented messages.
//!
//! A fragmented message body starts with a fixed prefix naming the device
//! service and command, followed by an information buffer. The prefix lives
//! only in the first fragment, so bodies are encoded before fragmentation
//! and parsed after reassembly.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::FrameError;
use crate::{
    service::{SERVICE_ID_LEN, ServiceId},
    status::{CommandType, Status},
};

/// Prefix length of a command body.
pub const COMMAND_PREFIX_LEN: usize = SERVICE_ID_LEN + 12;

/// Prefix length of a command-done body.
pub const COMMAND_DONE_PREFIX_LEN: usize = SERVICE_ID_LEN + 12;

/// Prefix length of an indicate-status body.
pub const INDICATION_PREFIX_LEN: usize = SERVICE_ID_LEN + 8;

/// Host command addressed to a device service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandBody {
    /// Target device service.
    pub service: ServiceId,
    /// Command identifier within the service.
    pub cid: u32,
    /// Query or set.
    pub command_type: CommandType,
    /// Command payload.
    pub buffer: Bytes,
}

impl CommandBody {
    /// Serialise the body.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] if the buffer length does not fit the
    /// `u32` length field.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let len = buffer_len(&self.buffer)?;
        let mut dst = BytesMut::with_capacity(COMMAND_PREFIX_LEN + self.buffer.len());
        dst.put_slice(self.service.as_bytes());
        dst.put_u32_le(self.cid);
        dst.put_u32_le(self.command_type.as_u32());
        dst.put_u32_le(len);
        dst.put_slice(&self.buffer);
        Ok(dst.freeze())
    }

    /// Parse a reassembled command body.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] when the prefix is truncated, the command type
    /// is unknown, or the buffer is shorter than declared.
    pub fn parse(mut src: Bytes) -> Result<Self, FrameError> {
        ensure("command body", COMMAND_PREFIX_LEN, &src)?;
        let service = take_service(&mut src);
        let cid = src.get_u32_le();
        let raw_type = src.get_u32_le();
        let command_type =
            CommandType::from_u32(raw_type).ok_or(FrameError::UnknownCommandType(raw_type))?;
        let declared = src.get_u32_le();
        Ok(Self {
            service,
            cid,
            command_type,
            buffer: take_buffer(src, declared)?,
        })
    }
}

/// Device answer to a [`CommandBody`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandDoneBody {
    /// Device service that handled the command.
    pub service: ServiceId,
    /// Command identifier within the service.
    pub cid: u32,
    /// Outcome reported by the device.
    pub status: Status,
    /// Response payload.
    pub buffer: Bytes,
}

impl CommandDoneBody {
    /// Serialise the body.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] if the buffer length does not fit the
    /// `u32` length field.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let len = buffer_len(&self.buffer)?;
        let mut dst = BytesMut::with_capacity(COMMAND_DONE_PREFIX_LEN + self.buffer.len());
        dst.put_slice(self.service.as_bytes());
        dst.put_u32_le(self.cid);
        dst.put_u32_le(self.status.get());
        dst.put_u32_le(len);
        dst.put_slice(&self.buffer);
        Ok(dst.freeze())
    }

    /// Parse a reassembled command-done body.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] when the prefix is truncated or the buffer is
    /// shorter than declared.
    pub fn parse(mut src: Bytes) -> Result<Self, FrameError> {
        ensure("command-done body", COMMAND_DONE_PREFIX_LEN, &src)?;
        let service = take_service(&mut src);
        let cid = src.get_u32_le();
        let status = Status::new(src.get_u32_le());
        let declared = src.get_u32_le();
        Ok(Self {
            service,
            cid,
            status,
            buffer: take_buffer(src, declared)?,
        })
    }
}

/// Unsolicited notification from a device service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndicationBody {
    /// Device service raising the notification.
    pub service: ServiceId,
    /// Command identifier within the service.
    pub cid: u32,
    /// Notification payload.
    pub buffer: Bytes,
}

impl IndicationBody {
    /// Serialise the body.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] if the buffer length does not fit the
    /// `u32` length field.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let len = buffer_len(&self.buffer)?;
        let mut dst = BytesMut::with_capacity(INDICATION_PREFIX_LEN + self.buffer.len());
        dst.put_slice(self.service.as_bytes());
        dst.put_u32_le(self.cid);
        dst.put_u32_le(len);
        dst.put_slice(&self.buffer);
        Ok(dst.freeze())
    }

    /// Parse a reassembled indicate-status body.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] when the prefix is truncated or the buffer is
    /// shorter than declared.
    pub fn parse(mut src: Bytes) -> Result<Self, FrameError> {
        ensure("indication body", INDICATION_PREFIX_LEN, &src)?;
        let service = take_service(&mut src);
        let cid = src.get_u32_le();
        let declared = src.get_u32_le();
        Ok(Self {
            service,
            cid,
            buffer: take_buffer(src, declared)?,
        })
    }
}

fn ensure(what: &'static str, needed: usize, src: &Bytes) -> Result<(), FrameError> {
    if src.len() < needed {
        return Err(FrameError::Truncated {
            what,
            needed,
            available: src.len(),
        });
    }
    Ok(())
}

fn take_service(src: &mut Bytes) -> ServiceId {
    let mut raw = [0u8; SERVICE_ID_LEN];
    src.copy_to_slice(&mut raw);
    ServiceId::from_bytes(raw)
}

/// Trailing bytes beyond the declared length are padding and are dropped.
fn take_buffer(mut src: Bytes, declared: u32) -> Result<Bytes, FrameError> {
    let declared = declared as usize;
    if declared > src.len() {
        return Err(FrameError::BufferLength {
            declared,
            available: src.len(),
        });
    }
    src.truncate(declared);
    Ok(src)
}

fn buffer_len(buffer: &Bytes) -> Result<u32, FrameError> {
    u32::try_from(buffer.len()).map_err(|_| FrameError::TooLarge(buffer.len()))
}
