//! Outbound helper that splits logical messages into transport fragments.
//!
//! [`Fragmenter`] chunks an encoded message body into pieces no larger than
//! the per-fragment payload cap and tags each piece with its
//! [`FragmentHeader`]. Chunks are zero-copy slices of the original body.

use std::num::NonZeroUsize;

use bytes::Bytes;

use super::{FRAGMENT_HEADER_LEN, FragmentHeader, FragmentationError};
use crate::{
    correlation::{CorrelationKey, MessageKind},
    frame::MESSAGE_HEADER_LEN,
};

/// Bytes of framing that precede the payload in every fragment.
pub const FRAGMENT_OVERHEAD: usize = MESSAGE_HEADER_LEN + FRAGMENT_HEADER_LEN;

/// Splits logical messages into fragment-sized frames.
#[derive(Clone, Copy, Debug)]
pub struct Fragmenter {
    max_fragment_payload: NonZeroUsize,
}

impl Fragmenter {
    /// Create a fragmenter that caps fragment payloads at `max_fragment_payload` bytes.
    #[must_use]
    pub const fn new(max_fragment_payload: NonZeroUsize) -> Self {
        Self {
            max_fragment_payload,
        }
    }

    /// Derive the payload cap from the maximum size of a single transfer.
    ///
    /// Returns `None` when the transfer size cannot hold the fragment
    /// overhead plus at least one payload byte.
    #[must_use]
    pub fn for_transfer_size(max_transfer: usize) -> Option<Self> {
        NonZeroUsize::new(max_transfer.saturating_sub(FRAGMENT_OVERHEAD)).map(Self::new)
    }

    /// Return the maximum fragment payload size in bytes.
    #[must_use]
    pub const fn max_fragment_payload(&self) -> NonZeroUsize { self.max_fragment_payload }

    /// Number of fragments needed for a body of `len` bytes.
    ///
    /// An empty body still occupies one fragment.
    #[must_use]
    pub const fn fragment_count(&self, len: usize) -> usize {
        if len == 0 {
            1
        } else {
            len.div_ceil(self.max_fragment_payload.get())
        }
    }

    /// Split `body` into fragments tagged with `kind` and `transaction_id`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use bytes::Bytes;
    /// use mbimlink::{correlation::MessageKind, fragment::Fragmenter};
    ///
    /// let fragmenter = Fragmenter::new(NonZeroUsize::new(4).expect("non-zero"));
    /// let batch = fragmenter
    ///     .fragment(MessageKind::Command, 9, Bytes::from_static(b"abcdefghij"))
    ///     .expect("fragment");
    /// let sizes: Vec<usize> = batch.fragments().iter().map(|f| f.payload().len()).collect();
    /// assert_eq!(sizes, [4, 4, 2]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::TooManyFragments`] if the fragment count
    /// does not fit the `u32` header field.
    pub fn fragment(
        &self,
        kind: MessageKind,
        transaction_id: u32,
        body: Bytes,
    ) -> Result<FragmentBatch, FragmentationError> {
        let len = body.len();
        let total = u32::try_from(self.fragment_count(len))
            .map_err(|_| FragmentationError::TooManyFragments { len })?;
        let max = self.max_fragment_payload.get();

        let fragments = (0..total)
            .map(|current| {
                // `current < total` and `total` came from a usize count, so the
                // offsets below cannot overflow.
                let offset = (current as usize) * max;
                let end = (offset + max).min(len);
                FragmentFrame::new(
                    kind,
                    transaction_id,
                    FragmentHeader::new(current, total),
                    body.slice(offset..end),
                )
            })
            .collect();

        Ok(FragmentBatch {
            key: CorrelationKey::new(kind, transaction_id),
            fragments,
        })
    }
}

/// Metadata and payload for a single fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentFrame {
    kind: MessageKind,
    transaction_id: u32,
    header: FragmentHeader,
    payload: Bytes,
}

impl FragmentFrame {
    /// Construct a new fragment frame.
    #[must_use]
    pub fn new(
        kind: MessageKind,
        transaction_id: u32,
        header: FragmentHeader,
        payload: Bytes,
    ) -> Self {
        Self {
            kind,
            transaction_id,
            header,
            payload,
        }
    }

    /// Kind of message this fragment belongs to.
    #[must_use]
    pub const fn kind(&self) -> MessageKind { self.kind }

    /// Raw transaction identifier carried in the message header.
    #[must_use]
    pub const fn transaction_id(&self) -> u32 { self.transaction_id }

    /// Key grouping this fragment with its siblings.
    #[must_use]
    pub const fn correlation_key(&self) -> CorrelationKey {
        CorrelationKey::new(self.kind, self.transaction_id)
    }

    /// Return the fragment header.
    #[must_use]
    pub const fn header(&self) -> FragmentHeader { self.header }

    /// Return the fragment payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Consume the frame, returning its header and payload.
    #[must_use]
    pub fn into_parts(self) -> (FragmentHeader, Bytes) { (self.header, self.payload) }
}

/// Collection of fragments produced for a single logical message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentBatch {
    key: CorrelationKey,
    fragments: Vec<FragmentFrame>,
}

impl FragmentBatch {
    /// Key shared by all fragments.
    #[must_use]
    pub const fn key(&self) -> CorrelationKey { self.key }

    /// Return the fragments as a slice.
    #[must_use]
    pub fn fragments(&self) -> &[FragmentFrame] { self.fragments.as_slice() }

    /// Number of fragments in the batch.
    #[expect(
        clippy::len_without_is_empty,
        reason = "batches are guaranteed non-empty"
    )]
    #[must_use]
    pub fn len(&self) -> usize { self.fragments.len() }

    /// Whether the logical message required more than one fragment.
    #[must_use]
    pub fn is_fragmented(&self) -> bool { self.len() > 1 }
}

impl IntoIterator for FragmentBatch {
    type Item = FragmentFrame;
    type IntoIter = std::vec::IntoIter<FragmentFrame>;

    fn into_iter(self) -> Self::IntoIter { self.fragments.into_iter() }
}
