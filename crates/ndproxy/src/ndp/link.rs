//! Links and the collaborators attached to them.

use std::fmt;
use std::net::Ipv6Addr;
use std::os::unix::io::AsRawFd;
use std::rc::Rc;

use super::io::NetIo;
use super::registry::Registry;
use super::wire::{Advert, Solicit};
use crate::util::MacAddr;

/// Stable handle to a link in a [`Registry`].
///
/// Handles are never reused while the registry lives, so a handle to a
/// removed link stays invalid instead of aliasing a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(usize);

impl LinkId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the link in the registry's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State of a proxy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Solicitation sent, waiting for an advertisement.
    Waiting,
    /// Target answered.
    Valid,
    /// Target did not answer in time.
    Invalid,
}

impl SessionStatus {
    /// Get the status name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A session waiting for a Neighbor Advertisement on a link.
///
/// Sessions refer back to links by [`LinkId`] only; the registry never
/// changes a session's status, it only reports advertisements to it.
pub trait Session<I: NetIo> {
    /// Address this session is resolving.
    fn target(&self) -> Ipv6Addr;

    /// Current status.
    fn status(&self) -> SessionStatus;

    /// Called once per matching advertisement while the session is
    /// [`SessionStatus::Waiting`].
    fn on_advert(&self, registry: &mut Registry<I>, link: LinkId, advert: Advert);
}

/// Policy deciding what to do with solicitations captured on a link.
pub trait SolicitHandler<I: NetIo> {
    /// Called once per decoded Neighbor Solicitation.
    fn on_solicit(&self, registry: &mut Registry<I>, link: LinkId, solicit: Solicit);
}

/// One monitored network interface.
pub struct Link<I: NetIo> {
    pub(crate) name: String,
    pub(crate) link_address: MacAddr,
    pub(crate) icmp: Option<I::Socket>,
    pub(crate) capture: Option<I::Socket>,
    pub(crate) sessions: Vec<Rc<dyn Session<I>>>,
    pub(crate) handler: Option<Rc<dyn SolicitHandler<I>>>,
}

impl<I: NetIo> Link<I> {
    pub(crate) fn new(name: &str, link_address: MacAddr, icmp: I::Socket) -> Self {
        Self {
            name: name.to_string(),
            link_address,
            icmp: Some(icmp),
            capture: None,
            sessions: Vec::new(),
            handler: None,
        }
    }

    /// Interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hardware address detected when the ICMPv6 socket was opened.
    pub fn link_address(&self) -> MacAddr {
        self.link_address
    }

    /// Check if the ICMPv6 socket is open.
    pub fn has_icmp_socket(&self) -> bool {
        self.icmp.is_some()
    }

    /// Check if the capture socket is open.
    pub fn has_capture_socket(&self) -> bool {
        self.capture.is_some()
    }

    /// Sessions attached to this link, in insertion order.
    pub fn sessions(&self) -> &[Rc<dyn Session<I>>] {
        &self.sessions
    }

    /// The policy handling solicitations on this link.
    pub fn handler(&self) -> Option<&Rc<dyn SolicitHandler<I>>> {
        self.handler.as_ref()
    }

    /// First waiting session for `target`, by insertion order.
    pub fn waiting_session(&self, target: Ipv6Addr) -> Option<Rc<dyn Session<I>>> {
        self.sessions
            .iter()
            .find(|s| s.target() == target && s.status() == SessionStatus::Waiting)
            .cloned()
    }
}

impl<I: NetIo> fmt::Debug for Link<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("name", &self.name)
            .field("link_address", &self.link_address)
            .field("icmp", &self.icmp.as_ref().map(|s| s.as_raw_fd()))
            .field("capture", &self.capture.as_ref().map(|s| s.as_raw_fd()))
            .field("sessions", &self.sessions.len())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
