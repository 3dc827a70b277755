//! Tests for inbound reassembly ordering, limits, and eviction.

use std::{
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use bytes::Bytes;
use proptest::prelude::*;

use crate::{
    correlation::{CorrelationKey, MessageKind},
    fragment::{
        FragmentError,
        FragmentFrame,
        FragmentHeader,
        Fragmenter,
        Reassembler,
        ReassemblyError,
    },
};

fn reassembler(limit: usize) -> Reassembler {
    Reassembler::new(
        NonZeroUsize::new(limit).expect("non-zero"),
        Duration::from_secs(30),
    )
    .expect("allocate assembly buffer")
}

fn response(transaction_id: u32, current: u32, total: u32, payload: &'static [u8]) -> FragmentFrame {
    FragmentFrame::new(
        MessageKind::Response,
        transaction_id,
        FragmentHeader::new(current, total),
        Bytes::from_static(payload),
    )
}

#[test]
fn single_fragment_completes_immediately() {
    let mut reassembler = reassembler(16);
    let complete = reassembler
        .push(response(1, 0, 1, &[0xaa, 0xbb]))
        .expect("reassembly must succeed")
        .expect("single fragment should complete message");

    assert_eq!(
        complete.key(),
        CorrelationKey::new(MessageKind::Response, 1)
    );
    assert_eq!(complete.payload().as_ref(), &[0xaa, 0xbb]);
    assert_eq!(reassembler.buffered_len(), 0);
}

#[test]
fn ordered_fragments_accumulate() {
    let mut reassembler = reassembler(16);
    assert!(reassembler.push(response(2, 0, 3, &[1, 2])).expect("first").is_none());
    assert!(reassembler.push(response(2, 1, 3, &[3])).expect("second").is_none());
    let complete = reassembler
        .push(response(2, 2, 3, &[4, 5]))
        .expect("final")
        .expect("message should complete");

    assert_eq!(complete.payload().as_ref(), &[1, 2, 3, 4, 5]);
    assert_eq!(reassembler.buffered_len(), 0);
}

#[test]
fn index_two_before_index_one_discards_the_message() {
    let mut reassembler = reassembler(64);
    assert!(reassembler.push(response(3, 0, 3, &[1])).expect("first").is_none());

    let err = reassembler
        .push(response(3, 2, 3, &[3]))
        .expect_err("out-of-order fragment must be rejected");
    assert!(matches!(err, ReassemblyError::Fragment {
        source: FragmentError::IndexMismatch {
            expected: 1,
            found: 2
        },
        ..
    }));
    assert_eq!(reassembler.buffered_len(), 0);

    // The late fragment has nothing to attach to and never completes anything.
    let err = reassembler
        .push(response(3, 1, 3, &[2]))
        .expect_err("orphan continuation must be rejected");
    assert!(matches!(err, ReassemblyError::MissingStart { current: 1, .. }));
}

#[test]
fn duplicate_fragment_discards_the_message() {
    let mut reassembler = reassembler(64);
    assert!(reassembler.push(response(4, 0, 2, &[1])).expect("first").is_none());
    let err = reassembler
        .push(response(4, 0, 2, &[1]))
        .expect_err("duplicate must be rejected");
    assert!(matches!(err, ReassemblyError::Fragment { .. }));
    assert_eq!(reassembler.buffered_len(), 0);
}

#[test]
fn responses_and_indications_use_separate_buffers() {
    let mut reassembler = reassembler(64);
    let indication = |current, payload: &'static [u8]| {
        FragmentFrame::new(
            MessageKind::Indication,
            7,
            FragmentHeader::new(current, 2),
            Bytes::from_static(payload),
        )
    };
    assert!(reassembler.push(response(7, 0, 2, b"re")).expect("response").is_none());
    assert!(reassembler.push(indication(0, b"in")).expect("indication").is_none());
    assert_eq!(reassembler.buffered_len(), 2);

    let done = reassembler
        .push(indication(1, b"d"))
        .expect("indication final")
        .expect("indication completes");
    assert_eq!(done.payload().as_ref(), b"ind");
    let done = reassembler
        .push(response(7, 1, 2, b"sp"))
        .expect("response final")
        .expect("response completes");
    assert_eq!(done.payload().as_ref(), b"resp");
}

#[test]
fn oversized_message_is_rejected_and_dropped() {
    let mut reassembler = reassembler(4);
    assert!(reassembler.push(response(5, 0, 2, &[0; 3])).expect("first").is_none());
    let err = reassembler
        .push(response(5, 1, 2, &[0; 2]))
        .expect_err("limit exceeded");
    assert!(matches!(err, ReassemblyError::MessageTooLarge {
        attempted: 5,
        limit: 4,
        ..
    }));
    assert_eq!(reassembler.buffered_len(), 0);
}

#[test]
fn stale_partial_messages_are_evicted() {
    let mut reassembler = Reassembler::new(
        NonZeroUsize::new(16).expect("non-zero"),
        Duration::from_secs(1),
    )
    .expect("allocate");
    let start = Instant::now();
    assert!(
        reassembler
            .push_at(response(6, 0, 2, &[1]), start)
            .expect("first")
            .is_none()
    );

    let evicted = reassembler.purge_expired_at(start + Duration::from_secs(2));
    assert_eq!(evicted, vec![CorrelationKey::new(MessageKind::Response, 6)]);
    assert_eq!(reassembler.buffered_len(), 0);
}

#[test]
fn clear_discards_everything() {
    let mut reassembler = reassembler(16);
    assert!(reassembler.push(response(8, 0, 2, &[1])).expect("first").is_none());
    assert!(reassembler.push(response(9, 0, 2, &[1])).expect("first").is_none());
    assert_eq!(reassembler.clear(), 2);
    assert_eq!(reassembler.buffered_len(), 0);
}

proptest! {
    #[test]
    fn fragmenter_output_reassembles_byte_for_byte(
        body in proptest::collection::vec(any::<u8>(), 0..2048),
        cap in 1usize..300,
    ) {
        let fragmenter = Fragmenter::new(NonZeroUsize::new(cap).expect("non-zero"));
        let batch = fragmenter
            .fragment(MessageKind::Response, 11, Bytes::from(body.clone()))
            .expect("fragment");
        let mut reassembler = reassembler(4096);
        let mut completed = None;
        for fragment in batch {
            prop_assert!(completed.is_none());
            completed = reassembler.push(fragment).expect("in-order fragment accepted");
        }
        let message = completed.expect("last fragment completes the message");
        prop_assert_eq!(message.payload().as_ref(), body.as_slice());
    }
}
