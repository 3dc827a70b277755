//! Tests driving a transport over an in-memory stream.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use rstest::rstest;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio_util::codec::FramedRead;

use super::*;
use crate::{
    fragment::FragmentFrame,
    frame::{CommandDoneBody, MessageCodec, ProtocolError},
    status::Status,
    transaction::ResponseOrigin,
};

struct Device {
    frames: FramedRead<ReadHalf<DuplexStream>, MessageCodec>,
    writer: WriteHalf<DuplexStream>,
}

impl Device {
    async fn next_fragment(&mut self) -> FragmentFrame {
        match self.frames.next().await {
            Some(Ok(Frame::Fragment(fragment))) => fragment,
            other => panic!("expected a command fragment, got {other:?}"),
        }
    }

    async fn write(&mut self, frame: Frame) {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).expect("encode");
        self.writer.write_all(&buf).await.expect("write to host");
    }

    async fn reply(&mut self, transaction_id: u32, status: Status, payload: &'static [u8]) {
        let body = CommandDoneBody {
            service: ServiceId::BASIC_CONNECT,
            cid: 1,
            status,
            buffer: Bytes::from_static(payload),
        }
        .encode()
        .expect("encode body");
        let fragmenter = Fragmenter::for_transfer_size(DEFAULT_MAX_CONTROL_TRANSFER)
            .expect("fragmenter");
        for fragment in fragmenter
            .fragment(MessageKind::Response, transaction_id, body)
            .expect("fragment")
        {
            self.write(Frame::Fragment(fragment)).await;
        }
    }
}

async fn start(builder: TransportBuilder) -> (Transport, Device) {
    let (host, device) = tokio::io::duplex(64 * 1024);
    let transport = builder.build(host).await.expect("start transport");
    let (reader, writer) = tokio::io::split(device);
    let device = Device {
        frames: FramedRead::new(reader, MessageCodec::new(DEFAULT_MAX_CONTROL_TRANSFER)),
        writer,
    };
    (transport, device)
}

fn counting_callback(counter: &Arc<AtomicUsize>) -> ErrorCallback {
    let counter = Arc::clone(counter);
    Arc::new(move |fault: &TransportFault| {
        if matches!(fault, TransportFault::DeviceRemoved { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    })
}

#[tokio::test]
async fn command_is_split_at_the_transfer_size() {
    let (transport, mut device) = start(Transport::builder().max_control_transfer(64)).await;
    let (transaction, _rx) = Transaction::channel();
    let id = transport
        .send(
            ServiceId::SMS,
            2,
            CommandType::Set,
            Bytes::from(vec![7u8; 100]),
            transaction,
        )
        .await
        .expect("send");

    // 28-byte command prefix plus 100 payload bytes, 44 bytes per fragment.
    let mut sizes = Vec::new();
    for expected in 0..3 {
        let fragment = device.next_fragment().await;
        assert_eq!(fragment.kind(), MessageKind::Command);
        assert_eq!(fragment.transaction_id(), id.get());
        assert_eq!(fragment.header().current(), expected);
        assert_eq!(fragment.header().total(), 3);
        sizes.push(fragment.payload().len());
    }
    assert_eq!(sizes, [44, 44, 40]);
    assert_eq!(transport.pending_transactions(), 1);
}

#[tokio::test]
async fn response_completes_the_transaction() {
    let (transport, mut device) = start(Transport::builder()).await;
    let (transaction, rx) = Transaction::channel();
    let id = transport
        .send(
            ServiceId::BASIC_CONNECT,
            1,
            CommandType::Query,
            Bytes::new(),
            transaction,
        )
        .await
        .expect("send");
    let fragment = device.next_fragment().await;
    device
        .reply(fragment.transaction_id(), Status::SUCCESS, &[0xaa, 0xbb])
        .await;

    let response = rx.await.expect("delivered").expect("response");
    assert_eq!(response.transaction_id(), id);
    assert_eq!(response.status(), Status::SUCCESS);
    assert_eq!(response.origin(), ResponseOrigin::Command {
        service: ServiceId::BASIC_CONNECT,
        cid: 1
    });
    assert_eq!(&response.payload()[..], &[0xaa, 0xbb]);
    assert_eq!(transport.pending_transactions(), 0);
}

#[tokio::test]
async fn function_error_fails_the_transaction() {
    let (transport, mut device) = start(Transport::builder()).await;
    let (transaction, rx) = Transaction::channel();
    transport
        .send(ServiceId::SMS, 3, CommandType::Query, Bytes::new(), transaction)
        .await
        .expect("send");
    let fragment = device.next_fragment().await;
    device
        .write(Frame::FunctionError {
            transaction_id: fragment.transaction_id(),
            error: ProtocolError::NotOpened,
        })
        .await;

    assert_eq!(
        rx.await.expect("delivered"),
        Err(TransactionError::Protocol(ProtocolError::NotOpened))
    );
}

#[rstest]
#[case(64, 37)]
#[case(1024, 997)]
#[tokio::test]
async fn oversized_command_is_rejected_before_registration(
    #[case] max_message_size: usize,
    #[case] payload_len: usize,
) {
    let (transport, _device) =
        start(Transport::builder().max_message_size(max_message_size)).await;
    let (transaction, _rx) = Transaction::channel();
    let err = transport
        .send(
            ServiceId::USSD,
            1,
            CommandType::Set,
            Bytes::from(vec![0u8; payload_len]),
            transaction,
        )
        .await
        .expect_err("too large");
    assert!(matches!(err, SendError::PayloadTooLarge { max, .. } if max == max_message_size));
    assert_eq!(transport.pending_transactions(), 0);
}

#[tokio::test]
async fn cancel_reports_only_the_first_removal() {
    let (transport, mut device) = start(Transport::builder()).await;
    let (transaction, mut rx) = Transaction::channel();
    let id = transport
        .send(ServiceId::SMS, 1, CommandType::Query, Bytes::new(), transaction)
        .await
        .expect("send");
    let _ = device.next_fragment().await;

    assert!(transport.cancel(id));
    assert!(!transport.cancel(id));
    assert!(rx.try_recv().is_err(), "cancelled transactions are not completed");
}

#[tokio::test]
async fn end_of_stream_is_treated_as_removal() {
    let removed = Arc::new(AtomicUsize::new(0));
    let (transport, mut device) =
        start(Transport::builder().on_error(counting_callback(&removed))).await;
    let (transaction, rx) = Transaction::channel();
    transport
        .send(ServiceId::SMS, 1, CommandType::Query, Bytes::new(), transaction)
        .await
        .expect("send");
    let _ = device.next_fragment().await;
    drop(device);

    assert_eq!(
        rx.await.expect("delivered"),
        Err(TransactionError::DeviceRemoved)
    );
    assert!(transport.is_device_removed());
    assert_eq!(removed.load(Ordering::SeqCst), 1);

    let (transaction, _rx) = Transaction::channel();
    let err = transport
        .send(ServiceId::SMS, 1, CommandType::Query, Bytes::new(), transaction)
        .await
        .expect_err("removed");
    assert!(matches!(err, SendError::DeviceRemoved));
    assert_eq!(removed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_fails_pending_and_closes() {
    let (transport, mut device) = start(Transport::builder()).await;
    let (transaction, rx) = Transaction::channel();
    transport
        .send(ServiceId::DSS, 1, CommandType::Query, Bytes::new(), transaction)
        .await
        .expect("send");
    let _ = device.next_fragment().await;

    transport.shutdown().await;
    transport.shutdown().await;
    assert_eq!(rx.await.expect("delivered"), Err(TransactionError::Shutdown));
    assert!(transport.is_closed());

    let (transaction, _rx) = Transaction::channel();
    let err = transport
        .send(ServiceId::DSS, 1, CommandType::Query, Bytes::new(), transaction)
        .await
        .expect_err("closed");
    assert!(matches!(err, SendError::Closed));
}

#[tokio::test(start_paused = true)]
async fn execute_and_wait_times_out_and_cancels() {
    let (transport, mut device) = start(Transport::builder()).await;
    let wait = transport.execute_and_wait(
        ServiceId::BASIC_CONNECT,
        1,
        CommandType::Query,
        Bytes::new(),
        Duration::from_secs(1),
    );
    let (result, _) = tokio::join!(wait, device.next_fragment());
    assert!(matches!(result, Err(ExecError::Timeout(d)) if d == Duration::from_secs(1)));
    assert_eq!(transport.pending_transactions(), 0);
}

#[tokio::test]
async fn execute_and_decode_skips_decoding_failure_status() {
    let (transport, mut device) = start(Transport::builder()).await;
    let call = transport.execute_and_decode(
        ServiceId::BASIC_CONNECT,
        1,
        CommandType::Query,
        Bytes::new(),
        Duration::from_secs(5),
        |_payload| -> Result<(), std::io::Error> { panic!("decode must not run") },
    );
    let respond = async {
        let fragment = device.next_fragment().await;
        device
            .reply(fragment.transaction_id(), Status::BUSY, &[])
            .await;
    };
    let (result, ()) = tokio::join!(call, respond);
    let err = result.expect_err("failure status");
    assert!(matches!(err, ExecError::Status(Status::BUSY)));
    assert_eq!(err.status(), Status::BUSY);
}

#[tokio::test]
async fn malformed_response_fails_the_transaction() {
    let (transport, mut device) = start(Transport::builder()).await;
    let (transaction, rx) = Transaction::channel();
    transport
        .send(ServiceId::SMS, 1, CommandType::Query, Bytes::new(), transaction)
        .await
        .expect("send");
    let fragment = device.next_fragment().await;

    // Four bytes cannot hold the service, cid, status and length fields.
    let fragmenter =
        Fragmenter::for_transfer_size(DEFAULT_MAX_CONTROL_TRANSFER).expect("fragmenter");
    for fragment in fragmenter
        .fragment(
            MessageKind::Response,
            fragment.transaction_id(),
            Bytes::from_static(&[1, 2, 3, 4]),
        )
        .expect("fragment")
    {
        device.write(Frame::Fragment(fragment)).await;
    }

    assert_eq!(rx.await.expect("delivered"), Err(TransactionError::Malformed));
    assert_eq!(transport.pending_transactions(), 0);
    assert_eq!(
        ExecError::from(TransactionError::Malformed).status(),
        Status::PARSE_FAILURE
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn removal_racing_send_never_strands_a_transaction() {
    let (transport, _device) = start(Transport::builder()).await;
    let completed = Arc::new(AtomicUsize::new(0));
    let mut sends = Vec::new();
    for cid in 0..64u32 {
        let transport = transport.clone();
        let completed = Arc::clone(&completed);
        sends.push(tokio::spawn(async move {
            let transaction = Transaction::new(move |_outcome| {
                completed.fetch_add(1, Ordering::SeqCst);
            });
            transport
                .send(ServiceId::SMS, cid, CommandType::Query, Bytes::new(), transaction)
                .await
        }));
    }
    // The device stays writable, so only the removal check can stop a send.
    transport.shared.mark_removed(None);

    let mut accepted = 0;
    for send in sends {
        match send.await.expect("send task") {
            Ok(_) => accepted += 1,
            Err(err) => assert!(matches!(err, SendError::DeviceRemoved)),
        }
    }
    assert_eq!(transport.pending_transactions(), 0);
    assert_eq!(completed.load(Ordering::SeqCst), accepted);
}
