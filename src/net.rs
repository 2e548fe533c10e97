//! UDP socket resolution, binding, and the poll-driven receive loop.

use crate::MetricsError;
use rustix::event::{poll, PollFd, PollFlags};
use rustix::fd::OwnedFd;
use rustix::pipe::pipe;
use std::ffi::CString;
use std::mem::MaybeUninit;
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, error};

/// Maximum datagram size accepted from the wire; longer datagrams are
/// truncated and the trailing (possibly partial) line is handled by the
/// parser as-is.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Resolves `(host, port)` into every passive datagram-socket address the
/// platform's resolver returns, mirroring `getaddrinfo(host, service,
/// {AI_PASSIVE, SOCK_DGRAM, AF_UNSPEC}, ...)`.
///
/// `std::net::ToSocketAddrs` cannot be used here: it only accepts numeric
/// ports, while the host daemon's `Port` option may be a service name.
///
/// # Errors
///
/// Returns [`MetricsError::AddressResolution`] if name resolution fails.
pub fn resolve_bind_addresses(host: &str, port: &str) -> Result<Vec<SocketAddr>, MetricsError> {
    let c_host = CString::new(host).map_err(|_| MetricsError::from("host contains a NUL byte"))?;
    let c_port = CString::new(port).map_err(|_| MetricsError::from("port contains a NUL byte"))?;

    let mut hints: libc::addrinfo = unsafe { MaybeUninit::zeroed().assume_init() };
    hints.ai_flags = libc::AI_PASSIVE;
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = libc::SOCK_DGRAM;

    let mut res: *mut libc::addrinfo = std::ptr::null_mut();
    // SAFETY: `c_host`/`c_port` are valid NUL-terminated C strings for the
    // duration of the call; `res` is freed below on every path.
    let status = unsafe { libc::getaddrinfo(c_host.as_ptr(), c_port.as_ptr(), &hints, &mut res) };
    if status != 0 {
        // SAFETY: `status` != 0 guarantees libc set this to a valid string.
        let detail = unsafe { std::ffi::CStr::from_ptr(libc::gai_strerror(status)) }
            .to_string_lossy()
            .into_owned();
        return Err(MetricsError::AddressResolution {
            host: host.to_string(),
            service: port.to_string(),
            detail,
        });
    }

    let mut addrs = Vec::new();
    let mut cur = res;
    while !cur.is_null() {
        // SAFETY: `cur` was produced by `getaddrinfo` and is non-null.
        let ai = unsafe { &*cur };
        if let Some(addr) = sockaddr_to_std(ai) {
            addrs.push(addr);
        }
        cur = ai.ai_next;
    }
    // SAFETY: `res` was allocated by the successful `getaddrinfo` call above.
    unsafe { libc::freeaddrinfo(res) };

    Ok(addrs)
}

fn sockaddr_to_std(ai: &libc::addrinfo) -> Option<SocketAddr> {
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};

    if ai.ai_addr.is_null() {
        return None;
    }
    // SAFETY: `ai_addr` is non-null and `ai_family` tells us which variant
    // it actually points to, per POSIX `getaddrinfo` contract.
    unsafe {
        match ai.ai_family {
            libc::AF_INET => {
                let sa = *(ai.ai_addr.cast::<libc::sockaddr_in>());
                let ip = Ipv4Addr::from(u32::from_be(sa.sin_addr.s_addr));
                let port = u16::from_be(sa.sin_port);
                Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
            }
            libc::AF_INET6 => {
                let sa = *(ai.ai_addr.cast::<libc::sockaddr_in6>());
                let ip = Ipv6Addr::from(sa.sin6_addr.s6_addr);
                let port = u16::from_be(sa.sin6_port);
                Some(SocketAddr::V6(SocketAddrV6::new(
                    ip,
                    port,
                    sa.sin6_flowinfo,
                    sa.sin6_scope_id,
                )))
            }
            _ => None,
        }
    }
}

/// Binds one non-blocking datagram socket per resolved address. Per-address
/// failures are logged and skipped; only a fully empty result is an error.
///
/// # Errors
///
/// Returns [`MetricsError::NoListeningSocket`] if not a single address
/// could be bound.
pub fn bind_sockets(
    host: &str,
    port: &str,
    addrs: &[SocketAddr],
) -> Result<Vec<UdpSocket>, MetricsError> {
    let mut sockets = Vec::new();
    for addr in addrs {
        debug!("statsd plugin: trying to bind to {addr}");
        match UdpSocket::bind(addr) {
            Ok(socket) => {
                if let Err(err) = socket.set_nonblocking(true) {
                    error!("statsd plugin: set_nonblocking failed: {err}");
                    continue;
                }
                sockets.push(socket);
            }
            Err(err) => {
                error!("statsd plugin: bind(2) failed: {err}");
            }
        }
    }

    if sockets.is_empty() {
        return Err(MetricsError::NoListeningSocket {
            host: host.to_string(),
            service: port.to_string(),
        });
    }

    Ok(sockets)
}

/// Owns a node's listening sockets and the self-pipe used to cancel its
/// receive loop from another thread. Every file descriptor is closed
/// unconditionally on drop, standing in for the host's scoped-cleanup
/// handler.
pub struct Receiver {
    sockets: Vec<UdpSocket>,
    cancel_read: OwnedFd,
    cancel_write: OwnedFd,
}

impl Receiver {
    /// Binds sockets for `(host, port)` and wires up a cancellation pipe.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution, binding, or pipe creation fails.
    pub fn bind(host: &str, port: &str) -> Result<Self, MetricsError> {
        let addrs = resolve_bind_addresses(host, port)?;
        let sockets = bind_sockets(host, port, &addrs)?;
        let (cancel_read, cancel_write) = pipe()?;
        Ok(Self {
            sockets,
            cancel_read,
            cancel_write,
        })
    }

    /// Returns a handle that can cancel this receiver's loop from another
    /// thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the cancellation pipe's write end could not be
    /// duplicated.
    pub fn cancel_handle(&self) -> Result<CancelHandle, MetricsError> {
        let write = rustix::io::dup(&self.cancel_write)?;
        Ok(CancelHandle { write })
    }

    /// Runs the receive loop until cancelled, handing each received
    /// datagram's text to `on_datagram`. Blocks the calling thread.
    pub fn run(&self, mut on_datagram: impl FnMut(&str)) {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            let mut poll_fds: Vec<PollFd<'_>> = self
                .sockets
                .iter()
                .map(|s| PollFd::new(s, PollFlags::IN))
                .collect();
            poll_fds.push(PollFd::new(&self.cancel_read, PollFlags::IN));

            match poll(&mut poll_fds, -1) {
                Ok(_) => {}
                Err(rustix::io::Errno::AGAIN) => continue,
                Err(rustix::io::Errno::INTR) => {
                    debug!("statsd plugin: poll(2) has been interrupted");
                    break;
                }
                Err(err) => {
                    error!("statsd plugin: poll(2) failed: {err}");
                    break;
                }
            }

            let cancelled = poll_fds
                .last()
                .is_some_and(|fd| fd.revents().contains(PollFlags::IN));
            if cancelled {
                debug!("statsd plugin: receive loop cancelled");
                break;
            }

            for (socket, pfd) in self.sockets.iter().zip(poll_fds.iter()) {
                if pfd.revents().is_empty() {
                    continue;
                }
                Self::drain_socket(socket, &mut buf, &mut on_datagram);
            }
        }
    }

    fn drain_socket(socket: &UdpSocket, buf: &mut [u8], on_datagram: &mut impl FnMut(&str)) {
        match socket.recv(buf) {
            Ok(n) => {
                let n = n.min(MAX_DATAGRAM_SIZE - 1);
                let text = String::from_utf8_lossy(&buf[..n]);
                debug!("statsd plugin: buffer '{text}'");
                on_datagram(&text);
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) => {
                error!("statsd plugin: recv(2) failed: {err}");
            }
        }
    }
}

/// A handle that can cancel a [`Receiver`]'s loop from another thread,
/// substituting for `pthread_cancel` in a way that only interrupts the
/// loop between datagrams rather than mid-parse.
pub struct CancelHandle {
    write: OwnedFd,
}

impl CancelHandle {
    /// Signals the receive loop to stop. Idempotent; a full pipe (from
    /// repeated calls) is harmless since the loop only checks readiness.
    pub fn cancel(&self) {
        let _ = rustix::io::write(&self.write, &[0u8]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_localhost() {
        let addrs = resolve_bind_addresses("127.0.0.1", "0").unwrap();
        assert!(!addrs.is_empty());
    }

    #[test]
    fn bind_and_cancel_stops_the_loop() {
        let receiver = Receiver::bind("127.0.0.1", "0").unwrap();
        let cancel = receiver.cancel_handle().unwrap();
        let handle = std::thread::spawn(move || {
            receiver.run(|_| {});
        });
        cancel.cancel();
        handle.join().unwrap();
    }
}
