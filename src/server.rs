//! Server side: listener setup, accept/dispatch loop, and echo handlers.
//!
//! One detached OS thread per accepted connection. The dispatcher never
//! blocks on handler completion; it returns to accepting immediately.
//! Handlers echo every payload back unchanged and fold their counters into
//! the shared aggregator on exit, whatever the exit cause.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::context::RunContext;
use crate::message::Message;
use crate::report;
use crate::stats::LocalCounters;

/// How long the accept loop sleeps when no connection is pending before it
/// rechecks the shutdown token.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Listen backlog.
const BACKLOG: i32 = 128;

/// Bind, listen, and serve until the context's token is cancelled.
///
/// Bind/listen failures are fatal and propagate; accept and per-connection
/// errors are logged and the loop continues.
pub fn run(config: &ServerConfig, ctx: Arc<RunContext>) -> io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = create_listener(addr)?;

    info!(
        addr = %addr,
        payload_size = config.payload_size,
        "Server listening"
    );

    let buf_len = Message::wire_len(config.payload_size);
    let started = Instant::now();

    accept_loop(&listener, buf_len, &ctx);

    info!("Server shutting down");
    report::print_summary("Echo server", &ctx.stats.snapshot(), started.elapsed());
    Ok(())
}

/// Accept connections until shutdown, dispatching each to its own detached
/// handler thread.
fn accept_loop(listener: &TcpListener, buf_len: usize, ctx: &Arc<RunContext>) {
    while ctx.shutdown.is_running() {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(peer = %peer, "Client connected");
                if let Err(e) = stream.set_nonblocking(false) {
                    warn!(peer = %peer, error = %e, "Failed to restore blocking mode");
                    continue;
                }

                let ctx = Arc::clone(ctx);
                let spawned = thread::Builder::new()
                    .name(format!("handler-{peer}"))
                    .spawn(move || handle_connection(stream, peer, buf_len, &ctx));
                if let Err(e) = spawned {
                    error!(peer = %peer, error = %e, "Failed to spawn handler");
                }
            }
            // The listener is non-blocking so an idle server still observes
            // shutdown; sleep briefly before rechecking the token.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!(error = %e, "Accept failed");
            }
        }
    }
}

/// Serve one connection: receive a payload, echo the exact bytes back,
/// repeat until peer close, error, or shutdown.
fn handle_connection(mut stream: TcpStream, peer: SocketAddr, buf_len: usize, ctx: &RunContext) {
    let mut buf = vec![0u8; buf_len];
    let mut local = LocalCounters::default();

    while ctx.shutdown.is_running() {
        let received = match stream.read(&mut buf) {
            Ok(0) => {
                debug!(peer = %peer, "Client disconnected");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Receive failed");
                break;
            }
        };
        local.record_recv(received as u64);

        if let Err(e) = stream.write_all(&buf[..received]) {
            warn!(peer = %peer, error = %e, "Echo failed");
            break;
        }
        local.record_send(received as u64);
    }

    ctx.stats.merge(&local);
}

/// Build the listening socket with address reuse so back-to-back runs can
/// rebind the port, then switch it to non-blocking for the polled accept
/// loop.
fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(
        match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_dispatcher(payload_size: usize) -> (SocketAddr, Arc<RunContext>, thread::JoinHandle<()>) {
        let ctx = Arc::new(RunContext::new());
        let listener = create_listener(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let addr = listener.local_addr().unwrap();
        let buf_len = Message::wire_len(payload_size);

        let loop_ctx = Arc::clone(&ctx);
        let handle = thread::spawn(move || accept_loop(&listener, buf_len, &loop_ctx));
        (addr, ctx, handle)
    }

    #[test]
    fn test_echoes_exact_bytes() {
        let (addr, ctx, handle) = spawn_dispatcher(16);

        let mut stream = TcpStream::connect(addr).unwrap();
        // Arbitrary content, terminators included: the echo is agnostic.
        let payload: Vec<u8> = (0u8..16).collect();
        stream.write_all(&payload).unwrap();

        let mut reply = vec![0u8; payload.len()];
        stream.read_exact(&mut reply).unwrap();
        assert_eq!(reply, payload);

        drop(stream);
        ctx.shutdown.cancel();
        handle.join().unwrap();
    }

    #[test]
    fn test_serves_connections_concurrently() {
        let (addr, ctx, handle) = spawn_dispatcher(16);
        let wire_len = Message::wire_len(16);

        // Both connections stay open across the exchange; neither blocks the
        // other from being served.
        let mut first = TcpStream::connect(addr).unwrap();
        let mut second = TcpStream::connect(addr).unwrap();

        for stream in [&mut second, &mut first] {
            let payload = vec![0x5au8; wire_len];
            stream.write_all(&payload).unwrap();
            let mut reply = vec![0u8; wire_len];
            stream.read_exact(&mut reply).unwrap();
            assert_eq!(reply, payload);
        }

        drop(first);
        drop(second);
        ctx.shutdown.cancel();
        handle.join().unwrap();
    }

    #[test]
    fn test_handler_merges_counters_on_disconnect() {
        let (addr, ctx, handle) = spawn_dispatcher(16);
        let wire_len = Message::wire_len(16);

        let mut stream = TcpStream::connect(addr).unwrap();
        let payload = vec![7u8; wire_len];
        stream.write_all(&payload).unwrap();
        let mut reply = vec![0u8; wire_len];
        stream.read_exact(&mut reply).unwrap();
        drop(stream);

        // The detached handler merges on its own schedule after the
        // disconnect; wait for it.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snap = ctx.stats.snapshot();
            if snap.messages_received == 1 {
                assert_eq!(snap.bytes_received, wire_len as u64);
                assert_eq!(snap.bytes_sent, wire_len as u64);
                assert_eq!(snap.messages_sent, 1);
                break;
            }
            assert!(Instant::now() < deadline, "handler never merged");
            thread::sleep(Duration::from_millis(10));
        }

        ctx.shutdown.cancel();
        handle.join().unwrap();
    }

    #[test]
    fn test_accept_loop_stops_on_cancel() {
        let (_addr, ctx, handle) = spawn_dispatcher(16);
        ctx.shutdown.cancel();
        handle.join().unwrap();
    }
}
