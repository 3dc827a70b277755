//! Subscriptions to unsolicited device notifications.
//!
//! Subscribers register a handler together with a [`ServiceFilter`]. The
//! receiver hands each reassembled indication to every matching subscriber
//! via [`IndicatorRegistry::dispatch`].

use std::fmt;

use bytes::Bytes;
use derive_more::Display;

use crate::service::ServiceId;

pub mod registry;

pub use registry::IndicatorRegistry;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("indicator#{_0}")]
pub struct IndicatorId(u64);

impl IndicatorId {
    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

/// Which device services a subscriber wants to hear from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceFilter {
    /// Every service.
    Any,
    /// A single service.
    Service(ServiceId),
}

impl ServiceFilter {
    /// Whether an indication from `service` passes the filter.
    #[must_use]
    pub fn matches(&self, service: &ServiceId) -> bool {
        match self {
            Self::Any => true,
            Self::Service(wanted) => wanted == service,
        }
    }
}

impl From<ServiceId> for ServiceFilter {
    fn from(service: ServiceId) -> Self { Self::Service(service) }
}

/// A reassembled notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Indication {
    /// Service raising the notification.
    pub service: ServiceId,
    /// Command identifier within the service.
    pub cid: u32,
    /// Notification payload.
    pub payload: Bytes,
}

impl fmt::Display for Indication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cid {} ({} bytes)",
            self.service,
            self.cid,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests;
