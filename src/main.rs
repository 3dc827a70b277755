//! Minimal binary driving a modem control channel with `mbimlink`.
//!
//! Opens the device, runs one command, and shuts the transport down.

mod cli;

use std::{process::ExitCode, time::Duration};

use bytes::Bytes;
use clap::Parser;
use mbimlink::{CommandType, ServiceFilter, ServiceId, Transport, TransportFault};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "mbimlink failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let timeout = Duration::from_secs(cli.timeout);
    let open_session = !matches!(cli.command, Command::Open);
    let transport = Transport::builder()
        .max_control_transfer(cli.max_transfer)
        .open_timeout(timeout)
        .open_session(open_session)
        .on_error(std::sync::Arc::new(|fault: &TransportFault| {
            eprintln!("device fault: {fault}");
        }))
        .connect(&cli.device)
        .await?;

    let result = match cli.command {
        Command::Open => handshake(&transport).await,
        Command::Query { service, cid } => query(&transport, &service, cid, timeout).await,
        Command::Monitor { seconds } => {
            monitor(&transport, seconds.map(Duration::from_secs)).await;
            Ok(())
        }
    };
    transport.shutdown().await;
    result
}

async fn handshake(transport: &Transport) -> Result<(), Box<dyn std::error::Error>> {
    transport.open_session().await?;
    println!("session opened");
    transport.close_session().await?;
    println!("session closed");
    Ok(())
}

async fn query(
    transport: &Transport,
    service: &str,
    cid: u32,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let service: ServiceId = service.parse()?;
    let response = transport
        .execute_and_wait(service, cid, CommandType::Query, Bytes::new(), timeout)
        .await?;
    println!("status: {}", response.status());
    println!("payload: {}", hex(response.payload()));
    Ok(())
}

async fn monitor(transport: &Transport, duration: Option<Duration>) {
    let id = transport.subscribe(ServiceFilter::Any, |indication| {
        println!("{indication}: {}", hex(&indication.payload));
    });
    match duration {
        Some(duration) => {
            tokio::select! {
                () = tokio::time::sleep(duration) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    transport.unsubscribe(id);
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}
