use bytes::{Buf, BufMut};

/// Encoded size of a [`FragmentHeader`].
pub const FRAGMENT_HEADER_LEN: usize = 8;

/// Position of a fragment within its logical message.
///
/// On the wire the header is two little-endian `u32` values: the total number
/// of fragments followed by the zero-based index of this fragment.
///
/// # Examples
///
/// ```
/// use mbimlink::fragment::FragmentHeader;
///
/// let header = FragmentHeader::new(2, 3);
/// assert!(header.is_valid());
/// assert!(header.is_last());
/// assert!(!FragmentHeader::new(3, 3).is_valid());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FragmentHeader {
    current: u32,
    total: u32,
}

impl FragmentHeader {
    /// Header describing fragment `current` of `total`.
    #[must_use]
    pub const fn new(current: u32, total: u32) -> Self { Self { current, total } }

    /// Header of a message that fits in a single fragment.
    #[must_use]
    pub const fn single() -> Self { Self::new(0, 1) }

    /// Zero-based index of this fragment.
    #[must_use]
    pub const fn current(&self) -> u32 { self.current }

    /// Declared number of fragments in the message.
    #[must_use]
    pub const fn total(&self) -> u32 { self.total }

    /// Report whether the index lies within the declared total.
    #[must_use]
    pub const fn is_valid(&self) -> bool { self.total > 0 && self.current < self.total }

    /// Report whether this fragment completes its message.
    #[must_use]
    pub const fn is_last(&self) -> bool { self.is_valid() && self.current + 1 == self.total }

    /// Append the wire representation to `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.total);
        dst.put_u32_le(self.current);
    }

    /// Read a header from the front of `src`.
    ///
    /// Returns `None` when fewer than [`FRAGMENT_HEADER_LEN`] bytes remain.
    pub fn decode(src: &mut impl Buf) -> Option<Self> {
        if src.remaining() < FRAGMENT_HEADER_LEN {
            return None;
        }
        let total = src.get_u32_le();
        let current = src.get_u32_le();
        Some(Self { current, total })
    }
}
