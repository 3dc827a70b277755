//! Transaction identifiers and inbound correlation keys.
//!
//! Outbound requests are tagged with a [`TransactionId`] drawn from a
//! [`TransactionIdAllocator`]; responses echo the identifier so the receiver
//! can find the waiting transaction. Inbound fragments are grouped by a
//! [`CorrelationKey`] so that a response and an indication sharing a raw
//! identifier never share an assembly buffer.

use std::{
    fmt,
    num::NonZeroU32,
    sync::atomic::{AtomicU32, Ordering},
};

use derive_more::Display;

/// Non-zero identifier correlating a request with its response.
///
/// Zero is reserved by the protocol (indications commonly carry it), so it
/// is unrepresentable here.
///
/// # Examples
///
/// ```
/// use mbimlink::correlation::TransactionId;
///
/// assert!(TransactionId::new(0).is_none());
/// assert_eq!(TransactionId::new(7).map(TransactionId::get), Some(7));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{_0}")]
pub struct TransactionId(NonZeroU32);

impl TransactionId {
    /// The first identifier handed out by a fresh allocator.
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Wrap a raw identifier, returning `None` for zero.
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> u32 { self.0.get() }

    /// Identifier following `self`, wrapping from `u32::MAX` back to one.
    #[must_use]
    pub const fn successor(self) -> Self {
        match self.0.checked_add(1) {
            Some(next) => Self(next),
            None => Self::FIRST,
        }
    }
}

/// Number of identifiers probed before allocation gives up.
///
/// Reaching the limit means that many consecutive identifiers are all still
/// pending, which only happens when responses are being lost wholesale.
pub const MAX_ALLOCATION_PROBES: usize = 1024;

/// Lock-free source of transaction identifiers.
///
/// The counter wraps after `u32::MAX` and never yields zero. Identifiers are
/// unique until the counter wraps; [`allocate`](Self::allocate) additionally
/// skips values the caller reports as still in use.
#[derive(Debug)]
pub struct TransactionIdAllocator {
    next: AtomicU32,
}

impl Default for TransactionIdAllocator {
    fn default() -> Self { Self::starting_at(TransactionId::FIRST) }
}

impl TransactionIdAllocator {
    /// Create an allocator whose first identifier is `start`.
    #[must_use]
    pub const fn starting_at(start: TransactionId) -> Self {
        Self {
            next: AtomicU32::new(start.get()),
        }
    }

    /// Return the next identifier without checking whether it is in use.
    #[must_use]
    pub fn next_id(&self) -> TransactionId {
        // Only uniqueness matters here, so relaxed ordering is sufficient.
        let previous = match self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                let current = TransactionId::new(current).unwrap_or(TransactionId::FIRST);
                Some(current.successor().get())
            }) {
            Ok(value) | Err(value) => value,
        };
        TransactionId::new(previous).unwrap_or(TransactionId::FIRST)
    }

    /// Return the next identifier for which `in_use` reports `false`.
    ///
    /// Returns `None` when [`MAX_ALLOCATION_PROBES`] consecutive identifiers
    /// are all still in use.
    pub fn allocate(&self, mut in_use: impl FnMut(TransactionId) -> bool) -> Option<TransactionId> {
        for _ in 0..MAX_ALLOCATION_PROBES {
            let id = self.next_id();
            if !in_use(id) {
                return Some(id);
            }
            tracing::debug!(transaction_id = %id, "skipping identifier still in use");
        }
        None
    }
}

/// Direction-independent classification of a fragmented inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// Completion of a host command.
    Response,
    /// Unsolicited notification.
    Indication,
    /// Host command, seen only by device-side code such as simulators.
    Command,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Response => "response",
            Self::Indication => "indication",
            Self::Command => "command",
        })
    }
}

/// Key grouping the fragments of one logical inbound message.
///
/// Continuation fragments repeat only the transaction identifier, so the key
/// is the message kind plus that raw identifier (which may be zero for
/// indications). The service identifier is taken from the first fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{kind}#{transaction_id}")]
pub struct CorrelationKey {
    kind: MessageKind,
    transaction_id: u32,
}

impl CorrelationKey {
    /// Construct a key for the given message kind and raw identifier.
    #[must_use]
    pub const fn new(kind: MessageKind, transaction_id: u32) -> Self {
        Self {
            kind,
            transaction_id,
        }
    }

    /// Message kind portion of the key.
    #[must_use]
    pub const fn kind(&self) -> MessageKind { self.kind }

    /// Raw transaction identifier portion of the key.
    #[must_use]
    pub const fn transaction_id(&self) -> u32 { self.transaction_id }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::{MAX_ALLOCATION_PROBES, TransactionId, TransactionIdAllocator};

    fn id(raw: u32) -> TransactionId { TransactionId::new(raw).expect("non-zero id") }

    #[test]
    fn allocator_starts_at_one_and_increments() {
        let allocator = TransactionIdAllocator::default();
        assert_eq!(allocator.next_id(), id(1));
        assert_eq!(allocator.next_id(), id(2));
        assert_eq!(allocator.next_id(), id(3));
    }

    #[test]
    fn allocator_wraps_without_yielding_zero() {
        let allocator = TransactionIdAllocator::starting_at(id(u32::MAX - 1));
        assert_eq!(allocator.next_id(), id(u32::MAX - 1));
        assert_eq!(allocator.next_id(), id(u32::MAX));
        assert_eq!(allocator.next_id(), id(1));
    }

    #[test]
    fn allocate_skips_identifiers_in_use() {
        let allocator = TransactionIdAllocator::default();
        let busy: HashSet<TransactionId> = [id(1), id(2)].into_iter().collect();
        assert_eq!(allocator.allocate(|candidate| busy.contains(&candidate)), Some(id(3)));
    }

    #[test]
    fn allocate_gives_up_when_everything_is_busy() {
        let allocator = TransactionIdAllocator::default();
        let mut probes = 0;
        let result = allocator.allocate(|_| {
            probes += 1;
            true
        });
        assert_eq!(result, None);
        assert_eq!(probes, MAX_ALLOCATION_PROBES);
    }

    proptest! {
        #[test]
        fn allocation_never_yields_zero_or_a_busy_id(
            start in 1u32..=u32::MAX,
            busy in proptest::collection::hash_set(1u32..=u32::MAX, 0..32),
        ) {
            let allocator = TransactionIdAllocator::starting_at(id(start));
            let busy: HashSet<TransactionId> = busy.into_iter().map(id).collect();
            for _ in 0..64 {
                let allocated = allocator
                    .allocate(|candidate| busy.contains(&candidate))
                    .expect("free identifier available");
                prop_assert_ne!(allocated.get(), 0);
                prop_assert!(!busy.contains(&allocated));
            }
        }
    }
}
