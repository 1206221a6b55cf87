//! copybench: measures user/kernel copy overhead on socket round trips.
//!
//! Two I/O strategies over the same wire protocol:
//! - two-copy: buffered send/receive, one user/kernel copy each way
//! - one-copy: scatter/gather send, the transmit-side copy eliminated
//!
//! The client drives concurrent round-trip load against the echo server for
//! a fixed duration and reports throughput and latency.

mod client;
mod config;
mod context;
mod message;
mod report;
mod server;
mod stats;
mod strategy;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{Cli, ClientConfig, Command, ServerConfig};
use context::RunContext;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Client(args) => {
            let config = ClientConfig::from(args);
            let (snapshot, elapsed) = client::run(&config)?;
            let label = format!("{} client", config.strategy.label());
            report::print_summary(&label, &snapshot, elapsed);
        }
        Command::Server(args) => {
            let config = ServerConfig::from(args);
            let ctx = Arc::new(RunContext::new());

            // Signal collaborator: SIGINT/SIGTERM cancel the token and the
            // dispatcher drains out of its accept loop.
            let token = ctx.shutdown.clone();
            ctrlc::set_handler(move || token.cancel())?;

            server::run(&config, ctx)?;
        }
    }

    Ok(())
}
