//! The link registry.
//!
//! [`Registry`] is the single owner of every [`Link`]: its sockets, its
//! session set and its solicitation handler. Everything else refers to a
//! link by [`LinkId`] and resolves it through the registry.
//!
//! Sockets are opened lazily and idempotently. A link comes into being
//! the first time its ICMPv6 socket opens successfully; opening the
//! capture socket first opens the ICMPv6 socket if needed, because the
//! hardware address is detected there.

use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::os::unix::io::AsRawFd;
use std::rc::Rc;

use tracing::{debug, error, warn};

use super::error::{Error, Result};
use super::io::NetIo;
use super::link::{Link, LinkId, Session, SolicitHandler};
use super::poll::PollSet;
use super::wire::{self, Advert, Solicit};

/// Size of the receive buffer; larger frames are truncated by the kernel.
pub const RECV_BUFFER: usize = 256;

fn get<I: NetIo>(links: &[Option<Link<I>>], id: LinkId) -> Result<&Link<I>> {
    links
        .get(id.index())
        .and_then(Option::as_ref)
        .ok_or(Error::LinkNotFound(id))
}

fn icmp_socket<I: NetIo>(link: &Link<I>) -> Result<&I::Socket> {
    link.icmp.as_ref().ok_or_else(|| Error::SocketNotOpen {
        interface: link.name.clone(),
        socket: "icmpv6",
    })
}

fn capture_socket<I: NetIo>(link: &Link<I>) -> Result<&I::Socket> {
    link.capture.as_ref().ok_or_else(|| Error::SocketNotOpen {
        interface: link.name.clone(),
        socket: "capture",
    })
}

/// All monitored links, their sockets and the poll view over them.
pub struct Registry<I: NetIo> {
    pub(super) io: I,
    pub(super) links: Vec<Option<Link<I>>>,
    by_name: HashMap<String, LinkId>,
    pub(super) poll: PollSet,
}

impl<I: NetIo> Registry<I> {
    /// Create an empty registry on top of an I/O layer.
    pub fn new(io: I) -> Self {
        Self {
            io,
            links: Vec::new(),
            by_name: HashMap::new(),
            poll: PollSet::new(),
        }
    }

    /// The I/O layer.
    pub fn io(&self) -> &I {
        &self.io
    }

    /// The I/O layer, mutably.
    pub fn io_mut(&mut self) -> &mut I {
        &mut self.io
    }

    /// Number of registered links.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Check if no link is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Find a link by interface name.
    pub fn lookup(&self, name: &str) -> Option<LinkId> {
        self.by_name.get(name).copied()
    }

    /// Resolve a link handle.
    pub fn link(&self, id: LinkId) -> Result<&Link<I>> {
        get(&self.links, id)
    }

    fn link_mut(&mut self, id: LinkId) -> Result<&mut Link<I>> {
        self.links
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::LinkNotFound(id))
    }

    /// Links in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (LinkId, &Link<I>)> {
        self.links
            .iter()
            .enumerate()
            .filter_map(|(index, link)| link.as_ref().map(|link| (LinkId::new(index), link)))
    }

    /// The poll view; always two entries per link.
    pub fn poll_set(&self) -> &PollSet {
        &self.poll
    }

    fn rebuild_poll(&mut self) {
        let links = self.links.iter().enumerate().filter_map(|(index, link)| {
            link.as_ref().map(|link| {
                (
                    LinkId::new(index),
                    link.icmp.as_ref().map(AsRawFd::as_raw_fd),
                    link.capture.as_ref().map(AsRawFd::as_raw_fd),
                )
            })
        });
        self.poll.rebuild(links);

        debug!(links = self.poll.links(), entries = self.poll.len(), "rebuilt poll set");
    }

    /// Open the ICMPv6 socket of `name`, registering the link on success.
    ///
    /// Returns the existing link without touching the OS if `name` is
    /// already registered; a registered link always has this socket. If
    /// the open fails, nothing is registered.
    pub fn open_icmp_socket(&mut self, name: &str) -> Result<LinkId> {
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }

        let (sock, hwaddr) = self.io.open_icmp(name).inspect_err(|e| {
            warn!(interface = name, error = %e, "failed to open ICMPv6 socket");
        })?;

        debug!(interface = name, fd = sock.as_raw_fd(), hwaddr = %hwaddr, "opened ICMPv6 socket");

        let id = LinkId::new(self.links.len());
        self.links.push(Some(Link::new(name, hwaddr, sock)));
        self.by_name.insert(name.to_string(), id);

        self.rebuild_poll();
        Ok(id)
    }

    /// Open the NS capture socket of `name`.
    ///
    /// Opens the ICMPv6 socket first if the link does not exist yet. A
    /// failure here leaves the link registered without a capture socket;
    /// the next call retries.
    pub fn open_capture_socket(&mut self, name: &str) -> Result<LinkId> {
        let id = match self.lookup(name) {
            Some(id) if self.link(id)?.has_capture_socket() => return Ok(id),
            Some(id) => id,
            None => self.open_icmp_socket(name)?,
        };

        let sock = self.io.open_capture(name).inspect_err(|e| {
            warn!(interface = name, error = %e, "failed to open capture socket");
        })?;

        debug!(interface = name, fd = sock.as_raw_fd(), "opened capture socket");

        self.link_mut(id)?.capture = Some(sock);
        self.rebuild_poll();
        Ok(id)
    }

    /// Remove a link, closing its sockets and dropping its sessions.
    ///
    /// Other links keep their handles and their order.
    pub fn remove_link(&mut self, name: &str) -> Result<()> {
        let id = self
            .by_name
            .remove(name)
            .ok_or_else(|| Error::NotRegistered(name.to_string()))?;

        if let Some(slot) = self.links.get_mut(id.index()) {
            *slot = None;
        }

        debug!(interface = name, "removed link");
        self.rebuild_poll();
        Ok(())
    }

    /// Set the policy that handles solicitations captured on `id`.
    pub fn set_handler(&mut self, id: LinkId, handler: Rc<dyn SolicitHandler<I>>) -> Result<()> {
        self.link_mut(id)?.handler = Some(handler);
        Ok(())
    }

    /// Attach a session to `id`; it will be offered advertisements
    /// received there.
    pub fn attach_session(&mut self, id: LinkId, session: Rc<dyn Session<I>>) -> Result<()> {
        let link = self.link_mut(id)?;
        debug!(interface = %link.name, target = %session.target(), "attached session");
        link.sessions.push(session);
        Ok(())
    }

    /// Detach a session from `id`. Returns whether it was attached.
    pub fn detach_session(&mut self, id: LinkId, session: &Rc<dyn Session<I>>) -> Result<bool> {
        let link = self.link_mut(id)?;
        let before = link.sessions.len();
        link.sessions.retain(|s| !Rc::ptr_eq(s, session));
        Ok(link.sessions.len() != before)
    }

    /// Read and decode one solicitation from the capture socket of `id`.
    pub fn receive_solicit(&mut self, id: LinkId) -> Result<Solicit> {
        let link = get(&self.links, id)?;
        let sock = capture_socket(link)?;

        let mut buf = [0u8; RECV_BUFFER];
        let (_, len) = self.io.recv(sock, &mut buf)?;
        let solicit = wire::decode_solicit(&buf[..len])?;

        debug!(
            interface = %link.name,
            source = %solicit.source,
            destination = %solicit.destination,
            target = %solicit.target,
            len,
            "received solicitation"
        );
        Ok(solicit)
    }

    /// Read and decode one advertisement from the ICMPv6 socket of `id`.
    pub fn receive_advert(&mut self, id: LinkId) -> Result<Advert> {
        let link = get(&self.links, id)?;
        let sock = icmp_socket(link)?;

        let mut buf = [0u8; RECV_BUFFER];
        let (source, len) = self.io.recv(sock, &mut buf)?;
        let target = wire::decode_advert(&buf[..len])?;

        debug!(interface = %link.name, source = %source, target = %target, len, "received advertisement");
        Ok(Advert { source, target })
    }

    fn transmit(&mut self, id: LinkId, dest: Ipv6Addr, buf: &[u8]) -> Result<usize> {
        let link = get(&self.links, id)?;
        let sock = icmp_socket(link)?;

        self.io.send(sock, dest, buf).map_err(|source| {
            error!(interface = %link.name, dest = %dest, error = %source, "transmit failed");
            Error::Transmit {
                interface: link.name.clone(),
                source,
            }
        })
    }

    /// Send a Neighbor Solicitation for `target` out of `id`, to the
    /// target's solicited-node group.
    pub fn transmit_solicit(&mut self, id: LinkId, target: Ipv6Addr) -> Result<usize> {
        let hwaddr = self.link(id)?.link_address;
        let (dest, body) = wire::encode_solicit(target, hwaddr);

        debug!(link = %id, target = %target, dest = %dest, "sending solicitation");
        self.transmit(id, dest, &body)
    }

    /// Send a Neighbor Advertisement for `target` to `dest` out of `id`,
    /// advertising the link's own hardware address.
    pub fn transmit_advert(&mut self, id: LinkId, dest: Ipv6Addr, target: Ipv6Addr) -> Result<usize> {
        let hwaddr = self.link(id)?.link_address;
        let body = wire::encode_advert(target, hwaddr);

        debug!(link = %id, target = %target, dest = %dest, "sending advertisement");
        self.transmit(id, dest, &body)
    }

    fn control_socket(link: &Link<I>) -> Result<&I::Socket> {
        capture_socket(link).or_else(|_| icmp_socket(link))
    }

    /// Check whether the all-multicast flag is set on `id`'s device.
    pub fn allmulti(&mut self, id: LinkId) -> Result<bool> {
        let link = get(&self.links, id)?;
        let sock = Self::control_socket(link)?;
        let flags = self.io.device_flags(sock, &link.name)?;
        Ok(flags & libc::IFF_ALLMULTI as libc::c_short != 0)
    }

    /// Set or clear the all-multicast flag on `id`'s device.
    ///
    /// Returns the previous state so callers can restore it. No flags are
    /// written if the device is already in the requested state.
    pub fn set_allmulti(&mut self, id: LinkId, enable: bool) -> Result<bool> {
        let link = get(&self.links, id)?;
        let sock = Self::control_socket(link)?;

        let flags = self.io.device_flags(sock, &link.name)?;
        let allmulti = libc::IFF_ALLMULTI as libc::c_short;
        let previous = flags & allmulti != 0;

        debug!(interface = %link.name, previous, enable, "setting all-multicast");

        if previous == enable {
            return Ok(previous);
        }

        let flags = if enable { flags | allmulti } else { flags & !allmulti };
        self.io.set_device_flags(sock, &link.name, flags)?;
        Ok(previous)
    }
}

impl<I: NetIo> std::fmt::Debug for Registry<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("links", &self.iter().map(|(_, l)| l).collect::<Vec<_>>())
            .field("poll", &self.poll)
            .finish()
    }
}
