//! Mutex-protected subscriber table with snapshot dispatch.
//!
//! Dispatch copies the matching subscribers out of the table and releases
//! the lock before running any handler, so handlers may subscribe or
//! unsubscribe (themselves included) without deadlocking. A subscriber
//! removed during a dispatch is marked inactive and skipped if it has not
//! been reached yet.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use super::{Indication, IndicatorId, ServiceFilter};

type Handler = Box<dyn Fn(&Indication) + Send + Sync>;

struct Subscriber {
    filter: ServiceFilter,
    active: AtomicBool,
    handler: Handler,
}

/// Registry of indication subscribers.
pub struct IndicatorRegistry {
    next_id: AtomicU64,
    subscribers: Mutex<BTreeMap<IndicatorId, Arc<Subscriber>>>,
}

impl Default for IndicatorRegistry {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(BTreeMap::new()),
        }
    }
}

impl std::fmt::Debug for IndicatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl IndicatorRegistry {
    /// Register `handler` for indications passing `filter`.
    pub fn subscribe(
        &self,
        filter: ServiceFilter,
        handler: impl Fn(&Indication) + Send + Sync + 'static,
    ) -> IndicatorId {
        let id = IndicatorId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = Arc::new(Subscriber {
            filter,
            active: AtomicBool::new(true),
            handler: Box::new(handler),
        });
        self.table().insert(id, subscriber);
        id
    }

    /// Remove a subscriber. Returns `false` if `id` was not registered.
    ///
    /// Once this returns, the handler is not invoked for any indication whose
    /// dispatch has not yet reached it.
    pub fn unsubscribe(&self, id: IndicatorId) -> bool {
        let removed = self.table().remove(&id);
        match removed {
            Some(subscriber) => {
                subscriber.active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize { self.table().len() }

    /// Whether no subscribers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.table().is_empty() }

    /// Deliver `indication` to every matching subscriber.
    ///
    /// Returns the number of handlers invoked. Handlers run in subscription
    /// order on the calling task; a panicking handler is logged and skipped.
    pub fn dispatch(&self, indication: &Indication) -> usize {
        let snapshot: Vec<Arc<Subscriber>> = self
            .table()
            .values()
            .filter(|subscriber| subscriber.filter.matches(&indication.service))
            .cloned()
            .collect();

        let mut delivered = 0;
        for subscriber in snapshot {
            if !subscriber.active.load(Ordering::Acquire) {
                continue;
            }
            crate::panic::run_callback("indicator", || (subscriber.handler)(indication));
            delivered += 1;
        }
        delivered
    }

    fn table(&self) -> MutexGuard<'_, BTreeMap<IndicatorId, Arc<Subscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
