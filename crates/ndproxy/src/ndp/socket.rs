//! Raw socket operations on Linux.
//!
//! Everything here is a thin wrapper around one or two libc calls. The
//! registry never calls these directly; it goes through [`NetIo`], whose
//! [`SystemIo`] implementation forwards here.
//!
//! [`NetIo`]: super::NetIo
//! [`SystemIo`]: super::SystemIo

use std::io;
use std::mem;
use std::net::Ipv6Addr;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use zerocopy::IntoBytes;

use super::error::{Error, Result};
use super::filter::{Icmp6Filter, SockFilter, advert_only_filter, build_ns_capture_filter};
use super::wire::ICMPV6_HLEN;
use crate::util::MacAddr;
use crate::util::ifname;

/// Hop limit for outgoing multicast; NDP receivers drop anything else.
pub const MULTICAST_HOPS: libc::c_int = 255;

/// `ICMP6_FILTER` socket option (from linux/icmpv6.h).
const ICMP6_FILTER: libc::c_int = 1;

/// An owned raw socket bound to one network device.
#[derive(Debug)]
pub struct RawSocket {
    fd: OwnedFd,
}

impl RawSocket {
    fn open(domain: libc::c_int, protocol: libc::c_int, ifname: &str) -> Result<Self> {
        // SAFETY: socket() has no memory-safety preconditions.
        let fd = unsafe { libc::socket(domain, libc::SOCK_RAW | libc::SOCK_CLOEXEC, protocol) };
        if fd < 0 {
            return Err(Error::setup(ifname, "socket"));
        }
        // SAFETY: fd was just returned by socket() and is owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { fd })
    }

    fn setsockopt<T: ?Sized>(
        &self,
        level: libc::c_int,
        name: libc::c_int,
        value: &T,
        ifname: &str,
        step: &'static str,
    ) -> Result<()> {
        // SAFETY: value points to a live T of the size we pass.
        let ret = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                level,
                name,
                (value as *const T).cast(),
                mem::size_of_val(value) as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(Error::setup(ifname, step));
        }
        Ok(())
    }

    fn bind_to_device(&self, ifname: &str) -> Result<()> {
        let name = ifname::to_ifr_name(ifname)?;
        self.setsockopt(
            libc::SOL_SOCKET,
            libc::SO_BINDTODEVICE,
            &name,
            ifname,
            "SO_BINDTODEVICE",
        )
    }

    fn set_non_blocking(&self, ifname: &str) -> Result<()> {
        let mut on: libc::c_int = 1;
        // SAFETY: FIONBIO reads one c_int through the pointer.
        let ret = unsafe { libc::ioctl(self.fd.as_raw_fd(), libc::FIONBIO, &mut on) };
        if ret < 0 {
            return Err(Error::setup(ifname, "FIONBIO"));
        }
        Ok(())
    }

    fn ifreq(ifname: &str) -> Result<libc::ifreq> {
        // SAFETY: ifreq is plain old data; all-zero is a valid value.
        let mut ifr: libc::ifreq = unsafe { mem::zeroed() };
        ifr.ifr_name = ifname::to_ifr_name(ifname)?;
        Ok(ifr)
    }

    fn hardware_address(&self, ifname: &str) -> Result<MacAddr> {
        let mut ifr = Self::ifreq(ifname)?;
        // SAFETY: SIOCGIFHWADDR fills the ifreq we pass by pointer.
        let ret = unsafe { libc::ioctl(self.fd.as_raw_fd(), libc::SIOCGIFHWADDR, &mut ifr) };
        if ret < 0 {
            return Err(Error::setup(ifname, "SIOCGIFHWADDR"));
        }

        // SAFETY: the kernel wrote ifru_hwaddr on success.
        let data = unsafe { ifr.ifr_ifru.ifru_hwaddr.sa_data };
        let mut mac = [0u8; 6];
        for (dst, &src) in mac.iter_mut().zip(data.iter()) {
            *dst = src as u8;
        }
        Ok(MacAddr(mac))
    }

    fn attach_filter(&self, program: &[SockFilter], ifname: &str) -> Result<()> {
        let mut insns: Vec<libc::sock_filter> = program.iter().map(|i| i.to_libc()).collect();
        let fprog = libc::sock_fprog {
            len: insns.len() as libc::c_ushort,
            filter: insns.as_mut_ptr(),
        };
        self.setsockopt(
            libc::SOL_SOCKET,
            libc::SO_ATTACH_FILTER,
            &fprog,
            ifname,
            "SO_ATTACH_FILTER",
        )
    }

    fn set_icmp6_filter(&self, filter: &Icmp6Filter, ifname: &str) -> Result<()> {
        self.setsockopt(
            libc::IPPROTO_ICMPV6,
            ICMP6_FILTER,
            filter.as_bytes(),
            ifname,
            "ICMP6_FILTER",
        )
    }
}

impl AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for RawSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Open the raw ICMPv6 socket for `ifname`.
///
/// The socket is bound to the device, sends multicast with hop limit 255,
/// is non-blocking, and only receives Neighbor Advertisements. Returns the
/// device's hardware address alongside. On failure the descriptor is
/// closed before returning.
pub fn open_icmp(ifname: &str) -> Result<(RawSocket, MacAddr)> {
    ifname::validate(ifname)?;

    let sock = RawSocket::open(libc::AF_INET6, libc::IPPROTO_ICMPV6, ifname)?;
    sock.bind_to_device(ifname)?;
    let hwaddr = sock.hardware_address(ifname)?;
    sock.setsockopt(
        libc::IPPROTO_IPV6,
        libc::IPV6_MULTICAST_HOPS,
        &MULTICAST_HOPS,
        ifname,
        "IPV6_MULTICAST_HOPS",
    )?;
    sock.set_non_blocking(ifname)?;
    sock.set_icmp6_filter(&advert_only_filter(), ifname)?;

    Ok((sock, hwaddr))
}

/// Open the packet socket that captures Neighbor Solicitations on `ifname`.
///
/// The socket sees IPv6 Ethernet frames, is bound to the device, is
/// non-blocking, and runs the NS capture filter.
pub fn open_capture(ifname: &str) -> Result<RawSocket> {
    ifname::validate(ifname)?;

    let protocol = libc::c_int::from((libc::ETH_P_IPV6 as u16).to_be());
    let sock = RawSocket::open(libc::AF_PACKET, protocol, ifname)?;
    sock.bind_to_device(ifname)?;
    sock.set_non_blocking(ifname)?;
    sock.attach_filter(&build_ns_capture_filter(), ifname)?;

    Ok(sock)
}

/// Receive one packet.
///
/// Returns the IPv6 peer (unspecified when the socket is not an IPv6
/// socket) and the number of bytes read. Fails on a receive error or a
/// payload shorter than an ICMPv6 header.
pub fn recv_from(sock: &impl AsRawFd, buf: &mut [u8]) -> Result<(Ipv6Addr, usize)> {
    // SAFETY: sockaddr_storage is plain old data; all-zero is valid.
    let mut peer: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr().cast(),
        iov_len: buf.len(),
    };
    // SAFETY: msghdr is plain old data; all-zero is valid.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_name = (&mut peer as *mut libc::sockaddr_storage).cast();
    msg.msg_namelen = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;

    // SAFETY: msg points at live buffers sized as advertised.
    let len = unsafe { libc::recvmsg(sock.as_raw_fd(), &mut msg, 0) };
    if len < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }

    let len = len as usize;
    if len < ICMPV6_HLEN {
        return Err(Error::Truncated {
            expected: ICMPV6_HLEN,
            actual: len,
        });
    }

    let source = if libc::c_int::from(peer.ss_family) == libc::AF_INET6 {
        // SAFETY: the family says the storage holds a sockaddr_in6.
        let sin6 = unsafe { &*(&peer as *const libc::sockaddr_storage).cast::<libc::sockaddr_in6>() };
        Ipv6Addr::from(sin6.sin6_addr.s6_addr)
    } else {
        Ipv6Addr::UNSPECIFIED
    };

    Ok((source, len))
}

/// Send one ICMPv6 message to `dest`.
pub fn send_to(sock: &impl AsRawFd, dest: Ipv6Addr, buf: &[u8]) -> io::Result<usize> {
    // SAFETY: sockaddr_in6 is plain old data; all-zero is valid.
    let mut sin6: libc::sockaddr_in6 = unsafe { mem::zeroed() };
    sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    sin6.sin6_port = (libc::IPPROTO_ICMPV6 as u16).to_be();
    sin6.sin6_addr.s6_addr = dest.octets();

    let mut iov = libc::iovec {
        iov_base: buf.as_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };
    // SAFETY: msghdr is plain old data; all-zero is valid.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_name = (&mut sin6 as *mut libc::sockaddr_in6).cast();
    msg.msg_namelen = mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;

    // SAFETY: msg points at live buffers; sendmsg does not write through iov.
    let len = unsafe { libc::sendmsg(sock.as_raw_fd(), &msg, 0) };
    if len < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(len as usize)
}

/// Wait for readiness on `fds`. Returns the number of ready entries.
///
/// Entries with a negative descriptor are ignored by the kernel.
pub fn poll(fds: &mut [libc::pollfd], timeout: Duration) -> io::Result<usize> {
    let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    // SAFETY: fds is a live, correctly sized pollfd array.
    let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret as usize)
}

/// Read the device flags (`IFF_*`) of `ifname` through any socket.
pub fn device_flags(sock: &impl AsRawFd, ifname: &str) -> Result<libc::c_short> {
    let mut ifr = RawSocket::ifreq(ifname)?;
    // SAFETY: SIOCGIFFLAGS fills the ifreq we pass by pointer.
    let ret = unsafe { libc::ioctl(sock.as_raw_fd(), libc::SIOCGIFFLAGS, &mut ifr) };
    if ret < 0 {
        return Err(Error::setup(ifname, "SIOCGIFFLAGS"));
    }
    // SAFETY: the kernel wrote ifru_flags on success.
    Ok(unsafe { ifr.ifr_ifru.ifru_flags })
}

/// Write the device flags (`IFF_*`) of `ifname` through any socket.
pub fn set_device_flags(sock: &impl AsRawFd, ifname: &str, flags: libc::c_short) -> Result<()> {
    let mut ifr = RawSocket::ifreq(ifname)?;
    ifr.ifr_ifru.ifru_flags = flags;
    // SAFETY: SIOCSIFFLAGS reads the ifreq we pass by pointer.
    let ret = unsafe { libc::ioctl(sock.as_raw_fd(), libc::SIOCSIFFLAGS, &mut ifr) };
    if ret < 0 {
        return Err(Error::setup(ifname, "SIOCSIFFLAGS"));
    }
    Ok(())
}
