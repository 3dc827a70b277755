//! Utilities for exercising an `mbimlink` transport against a simulated
//! modem during tests.
//!
//! The modem speaks the control protocol over a `tokio::io::duplex` stream,
//! so a [`Transport`](mbimlink::Transport) can be built on the host end with
//! no hardware present.
//!
//! ```rust
//! use bytes::Bytes;
//! use mbimlink::{CommandType, ServiceId, Transport};
//! use mbimlink_testing::{SimulatedModem, echo};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (host, modem) = SimulatedModem::pair();
//! let _device = modem.serve(echo());
//! let transport = Transport::builder().build(host).await.expect("start");
//! let response = transport
//!     .execute_and_wait(
//!         ServiceId::BASIC_CONNECT,
//!         1,
//!         CommandType::Query,
//!         Bytes::from_static(&[0xaa]),
//!         std::time::Duration::from_secs(1),
//!     )
//!     .await
//!     .expect("response");
//! assert_eq!(&response.payload()[..], &[0xaa]);
//! # }
//! ```

pub mod modem;

use rstest::fixture;
use tokio::io::DuplexStream;

pub use modem::{MAX_COMMAND_SIZE, Reply, Request, Responder, SimulatedModem, echo, query, silent};

/// Result type for tests that propagate errors with `?`.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Host stream and simulated modem using the default transfer size.
#[fixture]
pub fn modem_pair() -> (DuplexStream, SimulatedModem) { SimulatedModem::pair() }
