//! minheap Server Binary
//!
//! Serves one shared min-heap on a Unix socket. Each connection is one
//! open of the device.
//!
//! Usage:
//!   cargo run --release --bin minheap_server -- [OPTIONS]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use minheap::network::Server;
use minheap::{Service, ServiceConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// 1024 slots, 256-byte buffer
    Minheap,
    /// 256 slots, 16-byte buffer
    Tree,
    /// 100 slots, 32-byte buffer, -1 clears the heap
    Legacy,
}

/// Server configuration
#[derive(Parser, Debug)]
#[command(name = "minheap_server", version, about = "Bounded min-heap device server")]
struct Cli {
    /// Socket path standing in for the device node
    #[arg(short, long, default_value = "/tmp/minheap_device.sock")]
    socket: PathBuf,

    /// Base configuration
    #[arg(long, value_enum, default_value = "minheap")]
    preset: Preset,

    /// Override heap capacity
    #[arg(short, long)]
    capacity: Option<usize>,

    /// Override input buffer size (payload limit is one less)
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Treat this inserted value as a clear command
    #[arg(long, allow_hyphen_values = true)]
    clear_sentinel: Option<i32>,

    /// Log stats every N seconds (0 disables)
    #[arg(long, default_value_t = 5)]
    stats_interval: u64,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn service_config(&self) -> ServiceConfig {
        let mut config = match self.preset {
            Preset::Minheap => ServiceConfig::minheap_device(),
            Preset::Tree => ServiceConfig::tree_device(),
            Preset::Legacy => ServiceConfig::legacy_sentinel(),
        };
        if let Some(capacity) = self.capacity {
            config = config.with_capacity(capacity);
        }
        if let Some(buffer_size) = self.buffer_size {
            config = config.with_buffer_size(buffer_size);
        }
        if self.clear_sentinel.is_some() {
            config = config.with_clear_sentinel(self.clear_sentinel);
        }
        config
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let service = Arc::new(Service::from_config(cli.service_config())?);

    let mut server = Server::bind(&cli.socket, service)?;
    if cli.stats_interval > 0 {
        server = server.with_stats_interval(Duration::from_secs(cli.stats_interval));
    }

    server.run()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}
