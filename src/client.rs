//! Client side: connection workers and the run orchestrator.
//!
//! Each worker borrows one connection for the whole run and drives a
//! strictly sequential request/response loop over it. The payload is built
//! and encoded once per worker, so every iteration measures only the
//! transmit/receive copy cost, not allocation or encoding.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::context::RunContext;
use crate::message::Message;
use crate::stats::{LocalCounters, StatsSnapshot};
use crate::strategy::{CopyStrategy, StrategyKind};

/// Connect, drive load for the configured duration, and return the final
/// snapshot plus the measured wall time.
///
/// Connection setup failures are fatal and propagate; per-connection
/// failures during the run only end that worker's loop.
pub fn run(config: &ClientConfig) -> io::Result<(StatsSnapshot, Duration)> {
    let addr = resolve(&config.server_addr, config.port)?;

    info!(
        addr = %addr,
        payload_size = config.payload_size,
        threads = config.thread_count,
        duration_secs = config.duration.as_secs(),
        strategy = config.strategy.label(),
        "Starting client"
    );

    // Connect every worker's stream upfront so a refused endpoint fails the
    // whole run instead of a subset of workers.
    let mut streams = Vec::with_capacity(config.thread_count);
    for _ in 0..config.thread_count {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        streams.push(stream);
    }

    let ctx = RunContext::new();
    let started = Instant::now();

    thread::scope(|s| {
        for (worker_id, stream) in streams.iter().enumerate() {
            let ctx = &ctx;
            s.spawn(move || {
                drive_connection(worker_id, stream, config.strategy, config.payload_size, ctx)
            });
        }

        thread::sleep(config.duration);
        ctx.shutdown.cancel();
    });

    let elapsed = started.elapsed();

    // All workers have joined: this read is canonical, and the streams close
    // here in the orchestrator, not in the workers.
    let snapshot = ctx.stats.snapshot();
    drop(streams);

    Ok((snapshot, elapsed))
}

fn resolve(addr: &str, port: u16) -> io::Result<SocketAddr> {
    (addr, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no usable address for {addr}:{port}"),
        )
    })
}

/// One worker: a strictly sequential round-trip loop over one connection.
///
/// Local counters merge into the shared aggregator exactly once, at
/// teardown, whatever ended the loop.
fn drive_connection(
    worker_id: usize,
    stream: &TcpStream,
    kind: StrategyKind,
    payload_size: usize,
    ctx: &RunContext,
) {
    // Encode once; the same bytes go out every iteration.
    let message = Message::new(payload_size);
    let send_buf = message.encode();
    let mut recv_buf = vec![0u8; send_buf.len()];

    let mut strategy = kind.attach(stream);
    let mut local = LocalCounters::default();

    while ctx.shutdown.is_running() {
        let started = Instant::now();

        match strategy.transmit(&send_buf) {
            Ok(n) if n == send_buf.len() => local.record_send(n as u64),
            Ok(n) => {
                warn!(
                    worker = worker_id,
                    accepted = n,
                    expected = send_buf.len(),
                    "Short transmit, closing connection"
                );
                break;
            }
            Err(e) => {
                warn!(worker = worker_id, error = %e, "Transmit failed");
                break;
            }
        }

        let received = match receive_retrying(&mut *strategy, &mut recv_buf) {
            Ok(0) => {
                info!(worker = worker_id, "Server closed connection");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(worker = worker_id, error = %e, "Receive failed");
                break;
            }
        };

        let elapsed_us = started.elapsed().as_micros() as u64;
        local.record_recv(received as u64);
        local.record_latency(elapsed_us);

        debug_assert!(
            received != recv_buf.len() || Message::decode(&recv_buf).as_ref() == Ok(&message),
            "echo reply diverged from request"
        );
    }

    debug!(
        worker = worker_id,
        messages = local.messages_received,
        "Worker finished"
    );
    ctx.stats.merge(&local);
}

/// Receive, transparently retrying interrupted calls.
fn receive_retrying(strategy: &mut dyn CopyStrategy, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match strategy.receive(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
