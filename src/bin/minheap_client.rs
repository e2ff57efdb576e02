//! minheap Client Binary
//!
//! Talks to a running `minheap_server`. Every command is one open of the
//! device, so `pop` yields at most one value.
//!
//! Usage:
//!   minheap_client push 5 3 8 1
//!   minheap_client pop
//!   minheap_client drain
//!   minheap_client clear

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use minheap::network::{Client, ClientError};

#[derive(Parser, Debug)]
#[command(name = "minheap_client", version, about = "Client for the min-heap device")]
struct Cli {
    /// Device socket path
    #[arg(short, long, default_value = "/tmp/minheap_device.sock")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert values, one write each
    Push {
        #[arg(required = true, allow_hyphen_values = true)]
        values: Vec<String>,
    },
    /// Extract the minimum (one open, one read)
    Pop,
    /// Pop until the heap is empty, reopening between reads
    Drain,
    /// Clear the heap
    Clear,
}

fn run(cli: Cli) -> Result<(), ClientError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Push { values } => {
            let mut client = Client::connect(&cli.socket)?;
            for value in values {
                client.write(value.as_bytes())?;
                debug!(%value, "pushed");
            }
        }
        Command::Pop => {
            let data = Client::connect(&cli.socket)?.read()?;
            out.write_all(&data)?;
        }
        Command::Drain => loop {
            let data = Client::connect(&cli.socket)?.read()?;
            if data.is_empty() {
                break;
            }
            out.write_all(&data)?;
        },
        Command::Clear => Client::connect(&cli.socket)?.clear()?,
    }

    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "request failed");
            ExitCode::FAILURE
        }
    }
}
