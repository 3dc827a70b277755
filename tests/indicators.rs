//! Indication fan-out through a running transport.

use std::sync::{
    Arc,
    Mutex,
    OnceLock,
    atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use mbimlink::{CommandType, Indication, ServiceFilter, ServiceId, Status, Transport};
use mbimlink_testing::{SimulatedModem, TestResult};

/// Wait until the transport has processed everything written before it.
async fn settle(transport: &Transport, modem: &mut SimulatedModem) -> TestResult {
    let (transaction, rx) = mbimlink::Transaction::channel();
    transport
        .send(ServiceId::BASIC_CONNECT, 1, CommandType::Query, Bytes::new(), transaction)
        .await?;
    let request = modem.next_request().await.ok_or("modem closed")?;
    modem
        .reply(
            request.transaction_id(),
            ServiceId::BASIC_CONNECT,
            1,
            Status::SUCCESS,
            Bytes::new(),
        )
        .await?;
    rx.await?.map_err(|err| format!("settle failed: {err}"))?;
    Ok(())
}

#[tokio::test]
async fn indications_reach_matching_subscribers() -> TestResult {
    let (host, mut modem) = SimulatedModem::pair();
    let transport = Transport::builder().build(host).await?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sms = Arc::new(AtomicUsize::new(0));

    let log = Arc::clone(&seen);
    transport.subscribe(ServiceFilter::Any, move |indication: &Indication| {
        log.lock().expect("indication log").push(indication.clone());
    });
    let counter = Arc::clone(&sms);
    transport.subscribe(ServiceId::SMS.into(), move |_: &Indication| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    modem.indicate(ServiceId::BASIC_CONNECT, 11, vec![1u8, 2, 3]).await?;
    modem.indicate(ServiceId::SMS, 8, vec![0xeeu8; 6000]).await?;
    settle(&transport, &mut modem).await?;

    let seen = seen.lock().expect("indication log");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].service, ServiceId::BASIC_CONNECT);
    assert_eq!(seen[0].cid, 11);
    assert_eq!(&seen[0].payload[..], &[1, 2, 3]);
    assert_eq!(seen[1].payload.len(), 6000);
    assert_eq!(sms.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn subscriber_can_unsubscribe_from_its_handler() -> TestResult {
    let (host, mut modem) = SimulatedModem::pair();
    let transport = Transport::builder().build(host).await?;
    let calls = Arc::new(AtomicUsize::new(0));
    let own_id = Arc::new(OnceLock::new());

    let handler = {
        let transport = transport.clone();
        let calls = Arc::clone(&calls);
        let own_id = Arc::clone(&own_id);
        move |_: &Indication| {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = own_id.get() {
                transport.unsubscribe(*id);
            }
        }
    };
    let id = transport.subscribe(ServiceFilter::Any, handler);
    own_id.set(id).map_err(|_| "id already set")?;

    modem.indicate(ServiceId::STK, 1, Bytes::new()).await?;
    modem.indicate(ServiceId::STK, 1, Bytes::new()).await?;
    settle(&transport, &mut modem).await?;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!transport.unsubscribe(id));
    Ok(())
}

#[tokio::test]
async fn panicking_subscriber_does_not_stop_the_receiver() -> TestResult {
    let (host, mut modem) = SimulatedModem::pair();
    let transport = Transport::builder().build(host).await?;
    let after = Arc::new(AtomicUsize::new(0));

    transport.subscribe(ServiceFilter::Any, |_: &Indication| panic!("subscriber bug"));
    let counter = Arc::clone(&after);
    transport.subscribe(ServiceFilter::Any, move |_: &Indication| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    modem.indicate(ServiceId::USSD, 2, Bytes::new()).await?;
    modem.indicate(ServiceId::USSD, 2, Bytes::new()).await?;
    settle(&transport, &mut modem).await?;

    assert_eq!(after.load(Ordering::SeqCst), 2);
    Ok(())
}
