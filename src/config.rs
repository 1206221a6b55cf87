//! Command-line contract and resolved run configuration.
//!
//! The client takes five positional arguments, the server two; missing or
//! extra positionals are a usage error and the process exits non-zero before
//! any socket work. The raw argument structs resolve into immutable
//! `ClientConfig` / `ServerConfig` owned by the orchestrator for the whole
//! run.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::strategy::StrategyKind;

/// Command-line arguments for the benchmark harness.
#[derive(Debug, Parser)]
#[command(name = "copybench")]
#[command(version)]
#[command(about = "Measure user/kernel copy overhead on socket round trips", long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive round-trip load against an echo server
    Client(ClientArgs),
    /// Accept connections and echo every payload back
    Server(ServerArgs),
}

#[derive(Debug, Args)]
pub struct ClientArgs {
    /// Address of the echo server
    pub server_addr: String,

    /// Server port
    pub port: u16,

    /// Payload bytes carried per message
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub payload_size: u64,

    /// Number of worker threads, one connection each
    #[arg(value_parser = clap::value_parser!(u64).range(1..=1024))]
    pub thread_count: u64,

    /// How long to drive load, in seconds
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub duration_secs: u64,

    /// Transmit/receive strategy to measure
    #[arg(long, value_enum, default_value_t = StrategyKind::TwoCopy)]
    pub strategy: StrategyKind,
}

#[derive(Debug, Args)]
pub struct ServerArgs {
    /// Port to listen on
    pub port: u16,

    /// Payload bytes per message, agreed with the client out of band
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub payload_size: u64,
}

/// Resolved client configuration, immutable for the whole run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub port: u16,
    pub payload_size: usize,
    pub thread_count: usize,
    pub duration: Duration,
    pub strategy: StrategyKind,
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        Self {
            server_addr: args.server_addr,
            port: args.port,
            payload_size: args.payload_size as usize,
            thread_count: args.thread_count as usize,
            duration: Duration::from_secs(args.duration_secs),
            strategy: args.strategy,
        }
    }
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub payload_size: usize,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            port: args.port,
            payload_size: args.payload_size as usize,
        }
    }
}
