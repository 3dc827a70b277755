//! Background task reading the device.
//!
//! The loop owns the read half, the stream codec and the reassembler. It
//! exits when the stop token fires or the device is removed; in either case
//! partial inbound messages are discarded.

use std::{collections::TryReserveError, io, num::NonZeroUsize, sync::Arc, time::Duration};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

use super::{Shared, TransportConfig, TransportFault, is_removal};
use crate::{
    correlation::{MessageKind, TransactionId},
    fragment::{FragmentFrame, ReassembledMessage, Reassembler},
    frame::{CommandDoneBody, Frame, IndicationBody, MessageCodec},
    indicator::Indication,
    metrics,
    status::Status,
    transaction::{Outcome, Response, ResponseOrigin, TransactionError},
};

pub(super) type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Build the reassembler for `config`, reserving its buffer up front.
pub(super) fn reassembler(config: &TransportConfig) -> Result<Reassembler, TryReserveError> {
    let limit = NonZeroUsize::new(config.max_message_size).unwrap_or(NonZeroUsize::MIN);
    Reassembler::new(limit, config.reassembly_timeout)
}

pub(super) async fn run(shared: Arc<Shared>, mut reader: BoxedReader, mut reassembler: Reassembler) {
    let transfer = shared.config.max_control_transfer;
    let backoff = shared.config.read_backoff;
    let mut codec = MessageCodec::new(transfer);
    let mut buf = BytesMut::with_capacity(transfer);
    let mut delay = backoff.initial_delay;

    loop {
        buf.reserve(transfer);
        let read = tokio::select! {
            biased;
            () = shared.stop.cancelled() => break,
            read = reader.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!("control device reported end of file");
                shared.mark_removed(None);
                break;
            }
            Ok(_) => {
                delay = backoff.initial_delay;
                drain(&shared, &mut codec, &mut buf, &mut reassembler);
            }
            Err(err) if is_removal(&err) => {
                shared.mark_removed(err.raw_os_error());
                break;
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) => {}
            Err(err) => {
                warn!(error = %err, retry_in = ?delay, "read from control device failed");
                shared.notify(&TransportFault::read(&err));
                if !pause(&shared, delay).await {
                    break;
                }
                delay = backoff.next_delay(delay);
            }
        }
    }

    let discarded = reassembler.clear();
    if discarded > 0 {
        debug!(discarded, "dropped partial messages on receiver exit");
    }
    debug!("receiver stopped");
}

/// Sleep for `delay` unless stopped first. Returns `false` when stopped.
async fn pause(shared: &Shared, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = shared.stop.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

fn drain(
    shared: &Shared,
    codec: &mut MessageCodec,
    buf: &mut BytesMut,
    reassembler: &mut Reassembler,
) {
    loop {
        match codec.decode(buf) {
            Ok(Some(frame)) => {
                metrics::inc_frames(metrics::Direction::Inbound);
                dispatch(shared, reassembler, frame);
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "discarding malformed control message");
                metrics::inc_discarded("malformed");
            }
        }
    }
}

fn dispatch(shared: &Shared, reassembler: &mut Reassembler, frame: Frame) {
    match frame {
        Frame::OpenDone {
            transaction_id,
            status,
        } => resolve(shared, transaction_id, |id| {
            Ok(Response::new(id, ResponseOrigin::Open, status, bytes::Bytes::new()))
        }),
        Frame::CloseDone {
            transaction_id,
            status,
        } => resolve(shared, transaction_id, |id| {
            Ok(Response::new(id, ResponseOrigin::Close, status, bytes::Bytes::new()))
        }),
        Frame::FunctionError {
            transaction_id,
            error,
        } => {
            warn!(transaction_id, %error, "device reported protocol error");
            resolve(shared, transaction_id, |_| {
                Err(TransactionError::Protocol(error))
            });
        }
        Frame::Fragment(fragment) => assemble(shared, reassembler, fragment),
        host @ (Frame::Open { .. } | Frame::Close { .. } | Frame::HostError { .. }) => {
            debug!(message_type = %host.message_type(), "ignoring host-originated message");
            metrics::inc_discarded("unexpected");
        }
    }
}

fn assemble(shared: &Shared, reassembler: &mut Reassembler, fragment: FragmentFrame) {
    match reassembler.push(fragment) {
        Ok(Some(message)) => deliver(shared, message),
        Ok(None) => {}
        Err(err) => {
            warn!(key = %err.key(), error = %err, "discarding partial message");
            metrics::inc_discarded("fragment");
        }
    }
}

fn deliver(shared: &Shared, message: ReassembledMessage) {
    let key = message.key();
    match key.kind() {
        MessageKind::Response => match CommandDoneBody::parse(message.into_payload()) {
            Ok(body) => resolve(shared, key.transaction_id(), |id| {
                Ok(Response::new(
                    id,
                    ResponseOrigin::Command {
                        service: body.service,
                        cid: body.cid,
                    },
                    body.status,
                    body.buffer,
                ))
            }),
            Err(err) => {
                warn!(%key, error = %err, "failing transaction on malformed response");
                metrics::inc_discarded("malformed");
                resolve(shared, key.transaction_id(), |_| {
                    Err(TransactionError::Malformed)
                });
            }
        },
        MessageKind::Indication => match IndicationBody::parse(message.into_payload()) {
            Ok(body) => {
                let indication = Indication {
                    service: body.service,
                    cid: body.cid,
                    payload: body.buffer,
                };
                let delivered = shared.indicators.dispatch(&indication);
                debug!(%indication, delivered, "indication dispatched");
            }
            Err(err) => {
                warn!(%key, error = %err, "discarding malformed indication");
                metrics::inc_discarded("malformed");
            }
        },
        MessageKind::Command => {
            debug!(%key, "ignoring host command");
            metrics::inc_discarded("unexpected");
        }
    }
}

/// Complete the transaction registered under `raw`, if it is still pending.
fn resolve(shared: &Shared, raw: u32, outcome: impl FnOnce(TransactionId) -> Outcome) {
    let Some(id) = TransactionId::new(raw) else {
        debug!("ignoring completion with transaction id zero");
        metrics::inc_discarded("unknown_transaction");
        return;
    };
    let Some(transaction) = shared.transactions.remove(id) else {
        debug!(transaction_id = %id, "no pending transaction; discarding completion");
        metrics::inc_discarded("unknown_transaction");
        return;
    };
    metrics::set_pending(shared.transactions.len());
    let outcome = outcome(id);
    if let Ok(response) = &outcome {
        if response.status() != Status::SUCCESS {
            debug!(transaction_id = %id, status = %response.status(), "device returned failure status");
        }
    }
    transaction.complete(outcome);
}
