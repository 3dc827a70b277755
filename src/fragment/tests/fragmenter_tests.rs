//! Tests for outbound fragment splitting.

use std::num::NonZeroUsize;

use bytes::Bytes;
use rstest::rstest;

use crate::{
    correlation::MessageKind,
    fragment::{FRAGMENT_OVERHEAD, Fragmenter},
};

fn fragmenter(cap: usize) -> Fragmenter { Fragmenter::new(NonZeroUsize::new(cap).expect("non-zero")) }

#[test]
fn nine_thousand_bytes_split_into_three_fragments() {
    let body = Bytes::from((0..9000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>());
    let batch = fragmenter(4096)
        .fragment(MessageKind::Response, 5, body.clone())
        .expect("fragment");

    let sizes: Vec<usize> = batch.fragments().iter().map(|f| f.payload().len()).collect();
    assert_eq!(sizes, [4096, 4096, 808]);

    let joined: Vec<u8> = batch
        .fragments()
        .iter()
        .flat_map(|f| f.payload().iter().copied())
        .collect();
    assert_eq!(joined, body);
}

#[test]
fn headers_count_up_to_declared_total() {
    let batch = fragmenter(3)
        .fragment(MessageKind::Command, 1, Bytes::from_static(b"1234567"))
        .expect("fragment");
    assert!(batch.is_fragmented());
    for (index, fragment) in batch.fragments().iter().enumerate() {
        assert_eq!(fragment.header().current() as usize, index);
        assert_eq!(fragment.header().total(), 3);
        assert_eq!(fragment.transaction_id(), 1);
    }
    assert!(batch.fragments()[2].header().is_last());
}

#[test]
fn empty_body_still_produces_one_fragment() {
    let batch = fragmenter(16)
        .fragment(MessageKind::Command, 2, Bytes::new())
        .expect("fragment");
    assert_eq!(batch.len(), 1);
    assert!(batch.fragments()[0].payload().is_empty());
    assert!(batch.fragments()[0].header().is_last());
}

#[rstest]
#[case(1, 1)]
#[case(4096, 1)]
#[case(4097, 2)]
#[case(8192, 2)]
#[case(9000, 3)]
fn fragment_count_is_ceiling_division(#[case] len: usize, #[case] expected: usize) {
    assert_eq!(fragmenter(4096).fragment_count(len), expected);
}

#[test]
fn transfer_size_reserves_header_overhead() {
    let fragmenter = Fragmenter::for_transfer_size(4096).expect("valid transfer size");
    assert_eq!(fragmenter.max_fragment_payload().get(), 4096 - FRAGMENT_OVERHEAD);
    assert!(Fragmenter::for_transfer_size(FRAGMENT_OVERHEAD).is_none());
}
