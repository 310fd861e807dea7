//! In-memory [`NetIo`] for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::net::Ipv6Addr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Duration;

use super::error::{Error, Result};
use super::io::NetIo;
use super::link::{LinkId, Session, SessionStatus, SolicitHandler};
use super::poll::SlotKind;
use super::registry::Registry;
use super::wire::{Advert, Solicit};
use crate::util::MacAddr;

/// Deterministic hardware address for a fake interface.
pub(crate) fn mac(ifname: &str) -> MacAddr {
    let sum = ifname.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    MacAddr([0x02, 0x00, 0x00, 0x00, ifname.len() as u8, sum])
}

#[derive(Debug)]
pub(crate) struct FakeSocket {
    fd: RawFd,
}

impl AsRawFd for FakeSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub fd: RawFd,
    pub dest: Ipv6Addr,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct FakeIo {
    next_fd: RawFd,
    sockets: HashMap<(String, SlotKind), RawFd>,
    queues: HashMap<RawFd, VecDeque<(Ipv6Addr, Vec<u8>)>>,

    pub calls: Vec<String>,
    pub icmp_opens: usize,
    pub capture_opens: usize,
    pub fail_icmp: HashSet<String>,
    pub fail_capture: HashSet<String>,
    pub fail_send: bool,
    pub wait_error: Option<io::ErrorKind>,
    pub sent: Vec<Sent>,
    pub flags: HashMap<String, libc::c_short>,
    pub flag_writes: usize,
    pub waits: Vec<Duration>,
    pub idles: Vec<Duration>,
}

impl FakeIo {
    pub fn new() -> Self {
        Self {
            next_fd: 100,
            sockets: HashMap::new(),
            queues: HashMap::new(),
            calls: Vec::new(),
            icmp_opens: 0,
            capture_opens: 0,
            fail_icmp: HashSet::new(),
            fail_capture: HashSet::new(),
            fail_send: false,
            wait_error: None,
            sent: Vec::new(),
            flags: HashMap::new(),
            flag_writes: 0,
            waits: Vec::new(),
            idles: Vec::new(),
        }
    }

    fn socket(&mut self, ifname: &str, kind: SlotKind) -> FakeSocket {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.sockets.insert((ifname.to_string(), kind), fd);
        FakeSocket { fd }
    }

    fn queue(&mut self, ifname: &str, kind: SlotKind, peer: Ipv6Addr, payload: &[u8]) {
        let fd = self.sockets[&(ifname.to_string(), kind)];
        self.queues
            .entry(fd)
            .or_default()
            .push_back((peer, payload.to_vec()));
    }

    /// Queue a frame on the capture socket of `ifname`.
    pub fn queue_capture(&mut self, ifname: &str, frame: &[u8]) {
        self.queue(ifname, SlotKind::Capture, Ipv6Addr::UNSPECIFIED, frame);
    }

    /// Queue a datagram from `source` on the ICMPv6 socket of `ifname`.
    pub fn queue_icmp(&mut self, ifname: &str, source: Ipv6Addr, datagram: &[u8]) {
        self.queue(ifname, SlotKind::Icmp, source, datagram);
    }

    pub fn pending(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

impl NetIo for FakeIo {
    type Socket = FakeSocket;

    fn open_icmp(&mut self, ifname: &str) -> Result<(FakeSocket, MacAddr)> {
        self.calls.push(format!("open_icmp {}", ifname));
        if self.fail_icmp.contains(ifname) {
            return Err(Error::Setup {
                interface: ifname.to_string(),
                step: "SO_BINDTODEVICE",
                source: io::Error::from_raw_os_error(libc::ENODEV),
            });
        }

        self.icmp_opens += 1;
        self.flags.entry(ifname.to_string()).or_insert(
            (libc::IFF_UP | libc::IFF_BROADCAST | libc::IFF_MULTICAST) as libc::c_short,
        );
        Ok((self.socket(ifname, SlotKind::Icmp), mac(ifname)))
    }

    fn open_capture(&mut self, ifname: &str) -> Result<FakeSocket> {
        self.calls.push(format!("open_capture {}", ifname));
        if self.fail_capture.contains(ifname) {
            return Err(Error::Setup {
                interface: ifname.to_string(),
                step: "SO_ATTACH_FILTER",
                source: io::Error::from_raw_os_error(libc::EPERM),
            });
        }

        self.capture_opens += 1;
        Ok(self.socket(ifname, SlotKind::Capture))
    }

    fn recv(&mut self, sock: &FakeSocket, buf: &mut [u8]) -> Result<(Ipv6Addr, usize)> {
        let (peer, payload) = self
            .queues
            .get_mut(&sock.fd)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| Error::Io(io::ErrorKind::WouldBlock.into()))?;

        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        Ok((peer, len))
    }

    fn send(&mut self, sock: &FakeSocket, dest: Ipv6Addr, buf: &[u8]) -> io::Result<usize> {
        if self.fail_send {
            return Err(io::Error::from_raw_os_error(libc::ENETUNREACH));
        }
        self.sent.push(Sent {
            fd: sock.fd,
            dest,
            payload: buf.to_vec(),
        });
        Ok(buf.len())
    }

    fn wait(&mut self, fds: &mut [libc::pollfd], timeout: Duration) -> io::Result<usize> {
        self.waits.push(timeout);
        if let Some(kind) = self.wait_error {
            return Err(kind.into());
        }

        let mut ready = 0;
        for pfd in fds.iter_mut() {
            let queued = pfd.fd >= 0 && self.queues.get(&pfd.fd).is_some_and(|q| !q.is_empty());
            pfd.revents = if queued { libc::POLLIN } else { 0 };
            ready += usize::from(queued);
        }
        Ok(ready)
    }

    fn idle(&mut self, period: Duration) {
        self.idles.push(period);
    }

    fn device_flags(&mut self, _sock: &FakeSocket, ifname: &str) -> Result<libc::c_short> {
        Ok(self.flags.get(ifname).copied().unwrap_or(0))
    }

    fn set_device_flags(
        &mut self,
        _sock: &FakeSocket,
        ifname: &str,
        flags: libc::c_short,
    ) -> Result<()> {
        self.flag_writes += 1;
        self.flags.insert(ifname.to_string(), flags);
        Ok(())
    }
}

/// Session that records the advertisements it is offered.
#[derive(Debug)]
pub(crate) struct RecordingSession {
    target: Ipv6Addr,
    status: Cell<SessionStatus>,
    pub adverts: RefCell<Vec<(LinkId, Advert)>>,
}

impl RecordingSession {
    pub fn new(target: Ipv6Addr, status: SessionStatus) -> Rc<Self> {
        Rc::new(Self {
            target,
            status: Cell::new(status),
            adverts: RefCell::new(Vec::new()),
        })
    }

    pub fn waiting(target: Ipv6Addr) -> Rc<Self> {
        Self::new(target, SessionStatus::Waiting)
    }

    pub fn notified(&self) -> usize {
        self.adverts.borrow().len()
    }
}

impl Session<FakeIo> for RecordingSession {
    fn target(&self) -> Ipv6Addr {
        self.target
    }

    fn status(&self) -> SessionStatus {
        self.status.get()
    }

    fn on_advert(&self, _registry: &mut Registry<FakeIo>, link: LinkId, advert: Advert) {
        self.adverts.borrow_mut().push((link, advert));
    }
}

/// Handler that records the solicitations it is given.
#[derive(Debug, Default)]
pub(crate) struct RecordingHandler {
    pub solicits: RefCell<Vec<(LinkId, Solicit)>>,
}

impl SolicitHandler<FakeIo> for RecordingHandler {
    fn on_solicit(&self, _registry: &mut Registry<FakeIo>, link: LinkId, solicit: Solicit) {
        self.solicits.borrow_mut().push((link, solicit));
    }
}
