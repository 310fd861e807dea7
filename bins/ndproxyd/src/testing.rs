//! A socketless `NetIo` for exercising the proxy policy.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::Ipv6Addr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use ndproxy::ndp::NetIo;
use ndproxy::util::MacAddr;
use ndproxy::{Error, Result};

#[derive(Debug)]
pub struct LoopSocket(RawFd);

impl AsRawFd for LoopSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

#[derive(Debug)]
pub struct Packet {
    pub fd: RawFd,
    pub dest: Ipv6Addr,
    pub payload: Vec<u8>,
}

/// Records transmits; never has anything to receive.
#[derive(Debug, Default)]
pub struct Loopback {
    next_fd: RawFd,
    icmp: HashMap<String, RawFd>,
    pub unavailable: HashSet<String>,
    pub fail_send: bool,
    pub sent: Vec<Packet>,
}

impl Loopback {
    /// Descriptor of the ICMPv6 socket opened for `ifname`.
    pub fn icmp_fd(&self, ifname: &str) -> RawFd {
        self.icmp[ifname]
    }

    fn socket(&mut self) -> LoopSocket {
        self.next_fd += 1;
        LoopSocket(self.next_fd)
    }
}

impl NetIo for Loopback {
    type Socket = LoopSocket;

    fn open_icmp(&mut self, ifname: &str) -> Result<(LoopSocket, MacAddr)> {
        if self.unavailable.contains(ifname) {
            return Err(Error::Setup {
                interface: ifname.to_string(),
                step: "SO_BINDTODEVICE",
                source: io::Error::from_raw_os_error(libc::ENODEV),
            });
        }
        let sock = self.socket();
        self.icmp.insert(ifname.to_string(), sock.0);
        Ok((sock, MacAddr([0x02, 0, 0, 0, 0, self.next_fd as u8])))
    }

    fn open_capture(&mut self, _ifname: &str) -> Result<LoopSocket> {
        Ok(self.socket())
    }

    fn recv(&mut self, _sock: &LoopSocket, _buf: &mut [u8]) -> Result<(Ipv6Addr, usize)> {
        Err(Error::Io(io::ErrorKind::WouldBlock.into()))
    }

    fn send(&mut self, sock: &LoopSocket, dest: Ipv6Addr, buf: &[u8]) -> io::Result<usize> {
        if self.fail_send {
            return Err(io::Error::from_raw_os_error(libc::ENETDOWN));
        }
        self.sent.push(Packet {
            fd: sock.0,
            dest,
            payload: buf.to_vec(),
        });
        Ok(buf.len())
    }

    fn wait(&mut self, _fds: &mut [libc::pollfd], _timeout: Duration) -> io::Result<usize> {
        Ok(0)
    }

    fn idle(&mut self, _period: Duration) {}

    fn device_flags(&mut self, _sock: &LoopSocket, _ifname: &str) -> Result<libc::c_short> {
        Ok(0)
    }

    fn set_device_flags(
        &mut self,
        _sock: &LoopSocket,
        _ifname: &str,
        _flags: libc::c_short,
    ) -> Result<()> {
        Ok(())
    }
}
