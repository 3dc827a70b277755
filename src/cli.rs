//! Command line interface for the `mbimlink` binary.
//!
//! Kept free of library types so the build script can include it to
//! generate the manual page.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line arguments for the `mbimlink` binary.
#[derive(Debug, Parser)]
#[command(
    name = "mbimlink",
    version,
    about = "Talk to a mobile broadband modem over its control channel"
)]
pub struct Cli {
    /// Control device node, for example `/dev/cdc-wdm0`.
    #[arg(short, long)]
    pub device: PathBuf,

    /// Seconds to wait for each response.
    #[arg(short, long, default_value_t = 10)]
    pub timeout: u64,

    /// Largest control transfer in bytes.
    #[arg(long, default_value_t = 4096)]
    pub max_transfer: usize,

    #[command(subcommand)]
    pub command: Command,
}

/// Operation to perform once the device is open.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open and close a control session.
    Open,
    /// Send a raw query and print the status and payload.
    Query {
        /// Service UUID or alias such as `basic-connect`.
        #[arg(short, long)]
        service: String,
        /// Command identifier within the service.
        #[arg(short, long)]
        cid: u32,
    },
    /// Print indications as they arrive.
    Monitor {
        /// Stop after this many seconds; runs until interrupted if omitted.
        #[arg(short, long)]
        seconds: Option<u64>,
    },
}
