//! Metric helpers for `mbimlink`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking control messages read or written.
pub const FRAMES_PROCESSED: &str = "mbimlink_frames_processed_total";
/// Name of the counter tracking inbound messages dropped before delivery.
pub const MESSAGES_DISCARDED: &str = "mbimlink_messages_discarded_total";
/// Name of the counter tracking synchronous calls that timed out.
pub const TRANSACTION_TIMEOUTS: &str = "mbimlink_transaction_timeouts_total";
/// Name of the gauge tracking registered transactions.
pub const TRANSACTIONS_PENDING: &str = "mbimlink_transactions_pending";
/// Name of the counter tracking transport faults.
pub const TRANSPORT_FAULTS: &str = "mbimlink_transport_faults_total";
/// Name of the counter tracking panicking callbacks.
pub const CALLBACK_PANICS: &str = "mbimlink_callback_panics_total";

/// Direction of frame processing.
#[derive(Clone, Copy)]
pub enum Direction {
    /// Messages read from the device.
    Inbound,
    /// Messages written to the device.
    Outbound,
}

impl Direction {
    #[cfg_attr(
        not(feature = "metrics"),
        expect(dead_code, reason = "labels are only read by the recorder")
    )]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an inbound message dropped for `reason`.
pub fn inc_discarded(reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_DISCARDED, "reason" => reason).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}

/// Record a synchronous call that gave up waiting.
pub fn inc_timeouts() {
    #[cfg(feature = "metrics")]
    counter!(TRANSACTION_TIMEOUTS).increment(1);
}

/// Publish the number of registered transactions.
#[cfg_attr(
    feature = "metrics",
    expect(
        clippy::cast_precision_loss,
        reason = "gauge values are f64; pending counts stay far below 2^52"
    )
)]
pub fn set_pending(count: usize) {
    #[cfg(feature = "metrics")]
    gauge!(TRANSACTIONS_PENDING).set(count as f64);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record a transport fault of the given kind.
pub fn inc_faults(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(TRANSPORT_FAULTS, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a callback that panicked.
pub fn inc_callback_panics(callback: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(CALLBACK_PANICS, "callback" => callback).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = callback;
}
