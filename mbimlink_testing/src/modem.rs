//! Simulated modem speaking the control protocol over an in-memory stream.
//!
//! [`SimulatedModem::pair`] returns the host end of a `tokio::io::duplex`
//! stream, ready for [`TransportBuilder::build`](mbimlink::TransportBuilder::build),
//! together with the device end. Tests either script the device by hand with
//! [`next_request`](SimulatedModem::next_request) and the reply helpers, or
//! hand it a [`Responder`] and let [`serve`](SimulatedModem::serve) run it.

use std::{io, num::NonZeroUsize, time::Duration};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use mbimlink::{
    CommandType,
    Fragmenter,
    Frame,
    MessageCodec,
    MessageKind,
    ProtocolError,
    Reassembler,
    ServiceId,
    Status,
    frame::{CommandBody, CommandDoneBody, IndicationBody},
    transport::DEFAULT_MAX_CONTROL_TRANSFER,
};
use tokio::{
    io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf},
    task::JoinHandle,
};
use tokio_util::codec::FramedRead;

/// Largest command the simulated device reassembles.
pub const MAX_COMMAND_SIZE: usize = 256 * 1024;

/// A request as seen by the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// Session open.
    Open {
        /// Raw transaction identifier.
        transaction_id: u32,
        /// Transfer size announced by the host.
        max_control_transfer: u32,
    },
    /// Session close.
    Close {
        /// Raw transaction identifier.
        transaction_id: u32,
    },
    /// Reassembled service command.
    Command {
        /// Raw transaction identifier.
        transaction_id: u32,
        /// Decoded command body.
        body: CommandBody,
    },
}

impl Request {
    /// Raw transaction identifier of the request.
    #[must_use]
    pub fn transaction_id(&self) -> u32 {
        match self {
            Self::Open { transaction_id, .. }
            | Self::Close { transaction_id }
            | Self::Command { transaction_id, .. } => *transaction_id,
        }
    }
}

/// What a served device does with a command.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Answer with a status and payload.
    Done(Status, Bytes),
    /// Answer with a protocol error.
    Error(ProtocolError),
    /// Never answer.
    Silent,
}

/// Behaviour of a served device for service commands.
///
/// Open and close requests are always acknowledged with success.
pub trait Responder: Send + 'static {
    /// Decide how to answer `command`.
    fn respond(&mut self, command: &CommandBody) -> Reply;
}

impl<F> Responder for F
where
    F: FnMut(&CommandBody) -> Reply + Send + 'static,
{
    fn respond(&mut self, command: &CommandBody) -> Reply { self(command) }
}

/// Responder echoing every command's payload back with success.
#[must_use]
pub fn echo() -> impl Responder {
    |command: &CommandBody| Reply::Done(Status::SUCCESS, command.buffer.clone())
}

/// Responder that never answers.
#[must_use]
pub fn silent() -> impl Responder { |_: &CommandBody| Reply::Silent }

/// Device end of a simulated control channel.
pub struct SimulatedModem {
    frames: FramedRead<ReadHalf<DuplexStream>, MessageCodec>,
    writer: WriteHalf<DuplexStream>,
    fragmenter: Fragmenter,
    reassembler: Reassembler,
}

impl std::fmt::Debug for SimulatedModem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedModem")
            .field("fragmenter", &self.fragmenter)
            .finish_non_exhaustive()
    }
}

impl SimulatedModem {
    /// Create a connected host stream and modem using the default transfer size.
    #[must_use]
    pub fn pair() -> (DuplexStream, Self) { Self::pair_with_transfer(DEFAULT_MAX_CONTROL_TRANSFER) }

    /// Create a connected host stream and modem fragmenting at `max_transfer`.
    ///
    /// # Panics
    ///
    /// Panics if `max_transfer` cannot hold a fragment.
    #[must_use]
    pub fn pair_with_transfer(max_transfer: usize) -> (DuplexStream, Self) {
        let (host, device) = tokio::io::duplex(256 * 1024);
        let (reader, writer) = tokio::io::split(device);
        let fragmenter =
            Fragmenter::for_transfer_size(max_transfer).expect("transfer size holds a fragment");
        let reassembler = Reassembler::new(
            NonZeroUsize::new(MAX_COMMAND_SIZE).expect("non-zero"),
            Duration::from_secs(30),
        )
        .expect("reserve command buffer");
        let modem = Self {
            frames: FramedRead::new(reader, MessageCodec::new(max_transfer)),
            writer,
            fragmenter,
            reassembler,
        };
        (host, modem)
    }

    /// Read the next raw message from the host.
    ///
    /// Returns `None` once the host has closed its end.
    ///
    /// # Panics
    ///
    /// Panics if the host sends bytes that do not frame.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.frames
            .next()
            .await
            .map(|frame| frame.expect("host sent a well-formed message"))
    }

    /// Read the next complete request, reassembling command fragments.
    ///
    /// Returns `None` once the host has closed its end.
    ///
    /// # Panics
    ///
    /// Panics if the host breaks fragment ordering or sends a malformed
    /// command body.
    pub async fn next_request(&mut self) -> Option<Request> {
        loop {
            match self.next_frame().await? {
                Frame::Open {
                    transaction_id,
                    max_control_transfer,
                } => {
                    return Some(Request::Open {
                        transaction_id,
                        max_control_transfer,
                    });
                }
                Frame::Close { transaction_id } => return Some(Request::Close { transaction_id }),
                Frame::Fragment(fragment) if fragment.kind() == MessageKind::Command => {
                    let transaction_id = fragment.transaction_id();
                    let Some(message) = self
                        .reassembler
                        .push(fragment)
                        .expect("host fragments arrive in order")
                    else {
                        continue;
                    };
                    let body = CommandBody::parse(message.into_payload())
                        .expect("host sent a well-formed command");
                    return Some(Request::Command {
                        transaction_id,
                        body,
                    });
                }
                other => panic!("host sent an unexpected message: {other:?}"),
            }
        }
    }

    /// Answer a command, fragmenting the response as needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the host has closed its end.
    pub async fn reply(
        &mut self,
        transaction_id: u32,
        service: ServiceId,
        cid: u32,
        status: Status,
        payload: impl Into<Bytes>,
    ) -> io::Result<()> {
        let body = CommandDoneBody {
            service,
            cid,
            status,
            buffer: payload.into(),
        }
        .encode()
        .map_err(io::Error::other)?;
        self.write_fragmented(MessageKind::Response, transaction_id, body)
            .await
    }

    /// Raise an indication.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the host has closed its end.
    pub async fn indicate(
        &mut self,
        service: ServiceId,
        cid: u32,
        payload: impl Into<Bytes>,
    ) -> io::Result<()> {
        let body = IndicationBody {
            service,
            cid,
            buffer: payload.into(),
        }
        .encode()
        .map_err(io::Error::other)?;
        self.write_fragmented(MessageKind::Indication, 0, body).await
    }

    /// Acknowledge an open request.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the host has closed its end.
    pub async fn open_done(&mut self, transaction_id: u32, status: Status) -> io::Result<()> {
        self.write_frame(&Frame::OpenDone {
            transaction_id,
            status,
        })
        .await
    }

    /// Acknowledge a close request.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the host has closed its end.
    pub async fn close_done(&mut self, transaction_id: u32, status: Status) -> io::Result<()> {
        self.write_frame(&Frame::CloseDone {
            transaction_id,
            status,
        })
        .await
    }

    /// Reject a request with a protocol error.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the host has closed its end.
    pub async fn function_error(
        &mut self,
        transaction_id: u32,
        error: ProtocolError,
    ) -> io::Result<()> {
        self.write_frame(&Frame::FunctionError {
            transaction_id,
            error,
        })
        .await
    }

    /// Write one message as-is.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the frame cannot be encoded or the host has
    /// closed its end.
    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(frame.encoded_len());
        frame.encode(&mut buf).map_err(io::Error::other)?;
        self.write_raw(&buf).await
    }

    /// Write arbitrary bytes to the host.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the host has closed its end.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }

    /// Disconnect, as if the modem had been unplugged.
    pub fn unplug(self) { drop(self); }

    /// Run the device on a task, answering commands with `responder`.
    ///
    /// The task ends when the host closes its end.
    pub fn serve(mut self, mut responder: impl Responder) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = self.next_request().await {
                let written = match request {
                    Request::Open { transaction_id, .. } => {
                        self.open_done(transaction_id, Status::SUCCESS).await
                    }
                    Request::Close { transaction_id } => {
                        self.close_done(transaction_id, Status::SUCCESS).await
                    }
                    Request::Command {
                        transaction_id,
                        body,
                    } => match responder.respond(&body) {
                        Reply::Done(status, payload) => {
                            self.reply(transaction_id, body.service, body.cid, status, payload)
                                .await
                        }
                        Reply::Error(error) => self.function_error(transaction_id, error).await,
                        Reply::Silent => Ok(()),
                    },
                };
                if written.is_err() {
                    break;
                }
            }
        })
    }

    async fn write_fragmented(
        &mut self,
        kind: MessageKind,
        transaction_id: u32,
        body: Bytes,
    ) -> io::Result<()> {
        let batch = self
            .fragmenter
            .fragment(kind, transaction_id, body)
            .map_err(io::Error::other)?;
        for fragment in batch {
            let mut buf = BytesMut::new();
            Frame::Fragment(fragment)
                .encode(&mut buf)
                .map_err(io::Error::other)?;
            self.writer.write_all(&buf).await?;
        }
        self.writer.flush().await
    }
}

/// Build a query command body, convenient for assertions.
#[must_use]
pub fn query(service: ServiceId, cid: u32, payload: impl Into<Bytes>) -> CommandBody {
    CommandBody {
        service,
        cid,
        command_type: CommandType::Query,
        buffer: payload.into(),
    }
}
