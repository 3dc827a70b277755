//! Inbound helper that stitches fragments back into complete messages.
//!
//! [`Reassembler`] mirrors the outbound [`Fragmenter`](crate::fragment::Fragmenter)
//! by collecting fragment payloads keyed by
//! [`CorrelationKey`](crate::correlation::CorrelationKey). It enforces strict
//! ordering via [`FragmentSeries`], bounds the reconstructed size, and
//! purges partial assemblies older than a fixed timeout. Any sequencing
//! error discards the whole partial message; no partial payload is ever
//! returned.

use std::{
    collections::{HashMap, TryReserveError, hash_map::Entry},
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use bytes::Bytes;

use super::{FragmentFrame, FragmentSeries, FragmentStatus, ReassemblyError};
use crate::correlation::CorrelationKey;

#[derive(Debug)]
struct PartialMessage {
    series: FragmentSeries,
    buffer: Vec<u8>,
    started_at: Instant,
}

/// Container for a fully re-assembled message payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReassembledMessage {
    key: CorrelationKey,
    payload: Bytes,
}

impl ReassembledMessage {
    /// Key shared by the fragments that formed this message.
    #[must_use]
    pub const fn key(&self) -> CorrelationKey { self.key }

    /// Borrow the re-assembled payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Consume the message, returning the owned payload bytes.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }
}

/// Stateful fragment re-assembler with timeout-based eviction.
#[derive(Debug)]
pub struct Reassembler {
    max_message_size: NonZeroUsize,
    timeout: Duration,
    buffers: HashMap<CorrelationKey, PartialMessage>,
    spare: Vec<u8>,
}

impl Reassembler {
    /// Create a re-assembler bounded to `max_message_size` bytes per message.
    ///
    /// One assembly buffer of the full size is reserved up front so the
    /// first multi-fragment message never reallocates.
    ///
    /// # Errors
    ///
    /// Returns [`TryReserveError`] when the initial buffer cannot be
    /// allocated.
    pub fn new(max_message_size: NonZeroUsize, timeout: Duration) -> Result<Self, TryReserveError> {
        let mut spare = Vec::new();
        spare.try_reserve_exact(max_message_size.get())?;
        Ok(Self {
            max_message_size,
            timeout,
            buffers: HashMap::new(),
            spare,
        })
    }

    /// Process a fragment using the current time.
    ///
    /// Returns `Ok(Some(_))` when the fragment completes the message and
    /// `Ok(None)` while more fragments are required.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError`] when the fragment breaks ordering or size
    /// rules. The partial message for its key, if any, has been dropped.
    pub fn push(
        &mut self,
        fragment: FragmentFrame,
    ) -> Result<Option<ReassembledMessage>, ReassemblyError> {
        self.push_at(fragment, Instant::now())
    }

    /// Process a fragment using an explicit clock reading.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn push_at(
        &mut self,
        fragment: FragmentFrame,
        now: Instant,
    ) -> Result<Option<ReassembledMessage>, ReassemblyError> {
        self.purge_expired_at(now);

        let key = fragment.correlation_key();
        let limit = self.max_message_size.get();
        let (header, payload) = fragment.into_parts();

        match self.buffers.entry(key) {
            Entry::Occupied(mut occupied) => {
                let status = match occupied.get_mut().series.accept(header) {
                    Ok(status) => status,
                    Err(source) => {
                        let partial = occupied.remove();
                        self.recycle(partial.buffer);
                        return Err(ReassemblyError::Fragment { key, source });
                    }
                };

                let attempted = occupied.get().buffer.len().saturating_add(payload.len());
                if attempted > limit {
                    let partial = occupied.remove();
                    self.recycle(partial.buffer);
                    return Err(ReassemblyError::MessageTooLarge {
                        key,
                        attempted,
                        limit,
                    });
                }

                occupied.get_mut().buffer.extend_from_slice(&payload);
                match status {
                    FragmentStatus::Incomplete => Ok(None),
                    FragmentStatus::Complete => {
                        let buffer = occupied.remove().buffer;
                        Ok(Some(ReassembledMessage {
                            key,
                            payload: Bytes::from(buffer),
                        }))
                    }
                }
            }
            Entry::Vacant(vacant) => {
                if header.is_valid() && header.current() != 0 {
                    return Err(ReassemblyError::MissingStart {
                        key,
                        current: header.current(),
                    });
                }
                let (series, status) = FragmentSeries::start(header)
                    .map_err(|source| ReassemblyError::Fragment { key, source })?;
                if payload.len() > limit {
                    return Err(ReassemblyError::MessageTooLarge {
                        key,
                        attempted: payload.len(),
                        limit,
                    });
                }

                match status {
                    FragmentStatus::Complete => Ok(Some(ReassembledMessage { key, payload })),
                    FragmentStatus::Incomplete => {
                        let mut buffer = std::mem::take(&mut self.spare);
                        buffer.extend_from_slice(&payload);
                        vacant.insert(PartialMessage {
                            series,
                            buffer,
                            started_at: now,
                        });
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Remove partial messages that exceeded the configured timeout.
    ///
    /// Returns the keys of messages that were evicted.
    pub fn purge_expired(&mut self) -> Vec<CorrelationKey> { self.purge_expired_at(Instant::now()) }

    /// Remove partial messages that exceeded the configured timeout using an
    /// explicit clock reading.
    ///
    /// Returns the keys of messages that were evicted.
    pub fn purge_expired_at(&mut self, now: Instant) -> Vec<CorrelationKey> {
        let mut evicted = Vec::new();
        let timeout = self.timeout;

        self.buffers.retain(|key, partial| {
            let expired = now.saturating_duration_since(partial.started_at) >= timeout;
            if expired {
                evicted.push(*key);
            }
            !expired
        });

        evicted
    }

    /// Drop every partial message, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.buffers.len();
        self.buffers.clear();
        discarded
    }

    /// Number of partial messages currently buffered.
    #[must_use]
    pub fn buffered_len(&self) -> usize { self.buffers.len() }

    fn recycle(&mut self, mut buffer: Vec<u8>) {
        if buffer.capacity() > self.spare.capacity() {
            buffer.clear();
            self.spare = buffer;
        }
    }
}
