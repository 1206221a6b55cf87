//! The two transmit/receive strategies under measurement.
//!
//! Both drive the same blocking round-trip loop; they differ only in how the
//! payload crosses the user/kernel boundary on the send side:
//!
//! - [`BufferedIo`]: ordinary `write`/`read`. The kernel copies the payload
//!   into its socket buffer on transmit and out of it on receive — two
//!   copies per round trip.
//! - [`ScatterGatherIo`]: `sendmsg` with a single-segment iovec referencing
//!   the caller's buffer, so the kernel gathers directly from user memory on
//!   transmit. The receive-side kernel-to-user copy is unavoidable and
//!   remains — one copy per round trip.

use std::io::{self, Read, Write};
use std::mem;
use std::net::TcpStream;
use std::os::unix::io::AsRawFd;

use clap::ValueEnum;

/// One round-trip I/O strategy bound to a single connection.
pub trait CopyStrategy {
    /// Hand `buf` to the kernel for transmission, returning the bytes it
    /// accepted.
    fn transmit(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Block until the kernel delivers data into `buf`. `Ok(0)` is orderly
    /// peer close, not an error.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Strategy selector, chosen per run on the client command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    /// Baseline buffered path: one user/kernel copy each way.
    TwoCopy,
    /// Scatter/gather send path: the transmit-side copy is eliminated.
    OneCopy,
}

impl StrategyKind {
    /// Bind the strategy to a connection. The stream is only borrowed; the
    /// caller keeps ownership and closes it once the worker is done.
    pub fn attach(self, stream: &TcpStream) -> Box<dyn CopyStrategy + Send + '_> {
        match self {
            StrategyKind::TwoCopy => Box::new(BufferedIo { stream }),
            StrategyKind::OneCopy => Box::new(ScatterGatherIo { stream }),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::TwoCopy => "two-copy",
            StrategyKind::OneCopy => "one-copy",
        }
    }
}

/// Two-copy baseline over buffered socket calls.
pub struct BufferedIo<'a> {
    stream: &'a TcpStream,
}

impl CopyStrategy for BufferedIo<'_> {
    fn transmit(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

/// One-copy path over scatter/gather syscalls on the raw fd.
pub struct ScatterGatherIo<'a> {
    stream: &'a TcpStream,
}

impl CopyStrategy for ScatterGatherIo<'_> {
    fn transmit(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Single-segment gather descriptor over the caller's buffer; the
        // kernel reads from user memory without a staging copy.
        let iov = libc::iovec {
            iov_base: buf.as_ptr() as *mut libc::c_void,
            iov_len: buf.len(),
        };
        let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
        hdr.msg_iov = &iov as *const libc::iovec as *mut libc::iovec;
        hdr.msg_iovlen = 1;

        let sent = unsafe { libc::sendmsg(self.stream.as_raw_fd(), &hdr, 0) };
        if sent < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(sent as usize)
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr() as *mut libc::c_void,
            iov_len: buf.len(),
        };
        let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
        hdr.msg_iov = &mut iov;
        hdr.msg_iovlen = 1;

        let received = unsafe { libc::recvmsg(self.stream.as_raw_fd(), &mut hdr, 0) };
        if received < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(received as usize)
        }
    }
}
