//! Fragmentation and reassembly of control messages.
//!
//! A logical message larger than one control transfer is split into
//! fragments that each carry a [`FragmentHeader`] (current index and total
//! count). Each sub-module focuses on a single concept: the header, the
//! ordering tracker, the outbound splitter and the inbound re-assembler.

pub mod error;
pub mod fragmenter;
pub mod header;
pub mod reassembler;
pub mod series;

pub use error::{FragmentError, FragmentStatus, FragmentationError, ReassemblyError};
pub use fragmenter::{FRAGMENT_OVERHEAD, FragmentBatch, FragmentFrame, Fragmenter};
pub use header::{FRAGMENT_HEADER_LEN, FragmentHeader};
pub use reassembler::{ReassembledMessage, Reassembler};
pub use series::FragmentSeries;
