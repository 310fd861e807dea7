//! The OS boundary as a trait.

use std::net::Ipv6Addr;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use super::error::Result;
use super::socket::{self, RawSocket};
use crate::util::MacAddr;

/// Operations the registry and event loop need from the operating system.
///
/// [`SystemIo`] is the real implementation. Tests substitute a fake that
/// records calls and scripts readiness.
pub trait NetIo {
    /// An open socket handle. Dropping it closes the socket.
    type Socket: AsRawFd;

    /// Open the ICMPv6 socket for `ifname` and report the device's
    /// hardware address.
    fn open_icmp(&mut self, ifname: &str) -> Result<(Self::Socket, MacAddr)>;

    /// Open the NS capture socket for `ifname`.
    fn open_capture(&mut self, ifname: &str) -> Result<Self::Socket>;

    /// Receive one packet without blocking.
    fn recv(&mut self, sock: &Self::Socket, buf: &mut [u8]) -> Result<(Ipv6Addr, usize)>;

    /// Send one ICMPv6 message to `dest`.
    fn send(&mut self, sock: &Self::Socket, dest: Ipv6Addr, buf: &[u8]) -> std::io::Result<usize>;

    /// Block until an entry is readable or `timeout` expires.
    fn wait(&mut self, fds: &mut [libc::pollfd], timeout: Duration) -> std::io::Result<usize>;

    /// Sleep while there is nothing to wait on.
    fn idle(&mut self, period: Duration);

    /// Read the `IFF_*` flags of `ifname`.
    fn device_flags(&mut self, sock: &Self::Socket, ifname: &str) -> Result<libc::c_short>;

    /// Write the `IFF_*` flags of `ifname`.
    fn set_device_flags(
        &mut self,
        sock: &Self::Socket,
        ifname: &str,
        flags: libc::c_short,
    ) -> Result<()>;
}

/// [`NetIo`] backed by real Linux sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIo;

impl SystemIo {
    /// Create the system I/O layer.
    pub fn new() -> Self {
        Self
    }
}

impl NetIo for SystemIo {
    type Socket = RawSocket;

    fn open_icmp(&mut self, ifname: &str) -> Result<(RawSocket, MacAddr)> {
        socket::open_icmp(ifname)
    }

    fn open_capture(&mut self, ifname: &str) -> Result<RawSocket> {
        socket::open_capture(ifname)
    }

    fn recv(&mut self, sock: &RawSocket, buf: &mut [u8]) -> Result<(Ipv6Addr, usize)> {
        socket::recv_from(sock, buf)
    }

    fn send(&mut self, sock: &RawSocket, dest: Ipv6Addr, buf: &[u8]) -> std::io::Result<usize> {
        socket::send_to(sock, dest, buf)
    }

    fn wait(&mut self, fds: &mut [libc::pollfd], timeout: Duration) -> std::io::Result<usize> {
        socket::poll(fds, timeout)
    }

    fn idle(&mut self, period: Duration) {
        std::thread::sleep(period);
    }

    fn device_flags(&mut self, sock: &RawSocket, ifname: &str) -> Result<libc::c_short> {
        socket::device_flags(sock, ifname)
    }

    fn set_device_flags(
        &mut self,
        sock: &RawSocket,
        ifname: &str,
        flags: libc::c_short,
    ) -> Result<()> {
        socket::set_device_flags(sock, ifname, flags)
    }
}
