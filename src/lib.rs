#![doc(html_root_url = "https://docs.rs/mbimlink/latest")]
//! Public API for the `mbimlink` library.
//!
//! This crate provides the control-channel transport for mobile broadband
//! modems: message framing, fragmentation and reassembly, transaction
//! correlation, indication fan-out, and a device-driving engine with
//! synchronous request helpers.

pub mod correlation;
pub mod fragment;
pub mod frame;
pub mod indicator;
pub mod metrics;
pub mod panic;
pub mod service;
pub mod status;
pub mod transaction;
pub mod transport;

pub use correlation::{CorrelationKey, MessageKind, TransactionId};
pub use fragment::{
    FragmentBatch,
    FragmentError,
    FragmentFrame,
    FragmentHeader,
    FragmentSeries,
    FragmentStatus,
    FragmentationError,
    Fragmenter,
    ReassembledMessage,
    Reassembler,
    ReassemblyError,
};
pub use frame::{Frame, FrameError, MessageCodec, ProtocolError};
pub use indicator::{Indication, IndicatorId, ServiceFilter};
pub use metrics::{Direction, FRAMES_PROCESSED, MESSAGES_DISCARDED, TRANSPORT_FAULTS};
pub use service::ServiceId;
pub use status::{CommandType, Status};
pub use transaction::{Response, ResponseOrigin, Transaction, TransactionError};
pub use transport::{
    ErrorCallback,
    ExecError,
    SendError,
    Transport,
    TransportBuilder,
    TransportError,
    TransportFault,
};
