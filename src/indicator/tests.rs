//! Tests for subscriber filtering and dispatch under concurrent detachment.

use std::sync::{
    Arc,
    Mutex,
    OnceLock,
    atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use rstest::rstest;

use super::*;

fn indication(service: ServiceId) -> Indication {
    Indication {
        service,
        cid: 1,
        payload: Bytes::from_static(&[0x01]),
    }
}

fn counter_handler(counter: &Arc<AtomicUsize>) -> impl Fn(&Indication) + Send + Sync + 'static {
    let counter = Arc::clone(counter);
    move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[rstest]
#[case(ServiceFilter::Any, ServiceId::SMS, true)]
#[case(ServiceFilter::Service(ServiceId::SMS), ServiceId::SMS, true)]
#[case(ServiceFilter::Service(ServiceId::SMS), ServiceId::BASIC_CONNECT, false)]
fn filter_matching(#[case] filter: ServiceFilter, #[case] service: ServiceId, #[case] hit: bool) {
    assert_eq!(filter.matches(&service), hit);
}

#[test]
fn dispatch_reaches_only_matching_subscribers() {
    let registry = IndicatorRegistry::default();
    let any = Arc::new(AtomicUsize::new(0));
    let sms = Arc::new(AtomicUsize::new(0));
    registry.subscribe(ServiceFilter::Any, counter_handler(&any));
    registry.subscribe(ServiceId::SMS.into(), counter_handler(&sms));

    assert_eq!(registry.dispatch(&indication(ServiceId::BASIC_CONNECT)), 1);
    assert_eq!(registry.dispatch(&indication(ServiceId::SMS)), 2);
    assert_eq!(any.load(Ordering::SeqCst), 2);
    assert_eq!(sms.load(Ordering::SeqCst), 1);
}

#[test]
fn unsubscribe_is_reported_once() {
    let registry = IndicatorRegistry::default();
    let id = registry.subscribe(ServiceFilter::Any, |_| {});
    assert!(registry.unsubscribe(id));
    assert!(!registry.unsubscribe(id));
    assert!(registry.is_empty());
    assert_eq!(registry.dispatch(&indication(ServiceId::SMS)), 0);
}

#[test]
fn handler_may_unsubscribe_itself() {
    let registry = Arc::new(IndicatorRegistry::default());
    let own_id = Arc::new(OnceLock::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let later = Arc::new(AtomicUsize::new(0));

    let handler = {
        let registry = Arc::clone(&registry);
        let own_id = Arc::clone(&own_id);
        let calls = Arc::clone(&calls);
        move |_: &Indication| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = own_id.get() {
                registry.unsubscribe(*id);
            }
        }
    };
    let id = registry.subscribe(ServiceFilter::Any, handler);
    own_id.set(id).expect("set once");
    registry.subscribe(ServiceFilter::Any, counter_handler(&later));

    assert_eq!(registry.dispatch(&indication(ServiceId::SMS)), 2);
    assert_eq!(registry.dispatch(&indication(ServiceId::SMS)), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(later.load(Ordering::SeqCst), 2);
    assert_eq!(registry.len(), 1);
}

#[test]
fn subscriber_detached_mid_dispatch_is_skipped() {
    let registry = Arc::new(IndicatorRegistry::default());
    let victim = Arc::new(Mutex::new(None));
    let victim_calls = Arc::new(AtomicUsize::new(0));

    let killer = {
        let registry = Arc::clone(&registry);
        let victim = Arc::clone(&victim);
        move |_: &Indication| {
            if let Some(id) = victim.lock().expect("lock").take() {
                registry.unsubscribe(id);
            }
        }
    };
    registry.subscribe(ServiceFilter::Any, killer);
    let victim_id = registry.subscribe(ServiceFilter::Any, counter_handler(&victim_calls));
    *victim.lock().expect("lock") = Some(victim_id);

    assert_eq!(registry.dispatch(&indication(ServiceId::USSD)), 1);
    assert_eq!(victim_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_handler_does_not_stop_dispatch() {
    let registry = IndicatorRegistry::default();
    let after = Arc::new(AtomicUsize::new(0));
    registry.subscribe(ServiceFilter::Any, |_| panic!("bad subscriber"));
    registry.subscribe(ServiceFilter::Any, counter_handler(&after));

    assert_eq!(registry.dispatch(&indication(ServiceId::STK)), 2);
    assert_eq!(after.load(Ordering::SeqCst), 1);
}
