//! Stream codec framing control messages by their declared length.
//!
//! A character device normally hands over one message per read, but the
//! codec does not rely on it: bytes are buffered until the length in the
//! [`MessageHeader`] is satisfied. Messages longer than the transfer limit
//! are skipped without buffering them, and a header declaring less than its
//! own size flushes the buffer so decoding can resynchronise.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{Frame, FrameError, MESSAGE_HEADER_LEN, MessageHeader};

/// Length-framed codec for control messages.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use mbimlink::frame::{Frame, MessageCodec};
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = MessageCodec::new(4096);
/// let mut buf = BytesMut::new();
/// codec
///     .encode(Frame::Close { transaction_id: 3 }, &mut buf)
///     .expect("encode");
/// let frame = codec.decode(&mut buf).expect("decode");
/// assert_eq!(frame, Some(Frame::Close { transaction_id: 3 }));
/// ```
#[derive(Clone, Debug)]
pub struct MessageCodec {
    max_message_len: usize,
    skip: usize,
}

impl MessageCodec {
    /// Create a codec accepting messages of at most `max_message_len` bytes.
    ///
    /// The limit is raised to the header size if it is smaller.
    #[must_use]
    pub fn new(max_message_len: usize) -> Self {
        Self {
            max_message_len: max_message_len.max(MESSAGE_HEADER_LEN),
            skip: 0,
        }
    }

    /// Largest message the codec accepts.
    #[must_use]
    pub const fn max_message_len(&self) -> usize { self.max_message_len }

    /// Whether the codec is still discarding the tail of an oversized message.
    #[must_use]
    pub const fn is_skipping(&self) -> bool { self.skip > 0 }

    /// Forget any partial state, including an unfinished skip.
    pub fn reset(&mut self) { self.skip = 0; }

    fn consume_skip(&mut self, src: &mut BytesMut) {
        let n = self.skip.min(src.len());
        src.advance(n);
        self.skip -= n;
    }
}

impl Decoder for MessageCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.is_skipping() {
            self.consume_skip(src);
            if self.is_skipping() {
                return Ok(None);
            }
        }

        let Some(header) = MessageHeader::peek(src) else {
            return Ok(None);
        };
        let declared = header.length() as usize;

        if declared < MESSAGE_HEADER_LEN {
            let discarded = src.len();
            src.clear();
            return Err(FrameError::InvalidLength {
                declared,
                discarded,
            });
        }

        if declared > self.max_message_len {
            self.skip = declared;
            self.consume_skip(src);
            return Err(FrameError::Oversized {
                declared,
                limit: self.max_message_len,
            });
        }

        if src.len() < declared {
            src.reserve(declared - src.len());
            return Ok(None);
        }

        Frame::parse(src.split_to(declared).freeze()).map(Some)
    }
}

impl Encoder<Frame> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}
