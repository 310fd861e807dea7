//! Probe sessions for forwarded targets.

use std::cell::{Cell, RefCell};
use std::net::Ipv6Addr;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ndproxy::ndp::{Advert, NetIo, Session, SessionStatus};
use ndproxy::{LinkId, Registry};
use tracing::{debug, warn};

/// What housekeeping decided for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Keep,
    /// Probe timed out; the session now caches a negative answer.
    Invalidated,
    /// Lived past its time to live.
    Drop,
}

/// A probe for `target` on an upstream link, on behalf of hosts on a
/// downstream link.
#[derive(Debug)]
pub struct ProxySession {
    target: Ipv6Addr,
    downstream: LinkId,
    upstream: LinkId,
    status: Cell<SessionStatus>,
    requesters: RefCell<Vec<Ipv6Addr>>,
    touched: Cell<Instant>,
}

impl ProxySession {
    pub fn new(
        target: Ipv6Addr,
        downstream: LinkId,
        upstream: LinkId,
        requester: Ipv6Addr,
        now: Instant,
    ) -> Rc<Self> {
        Rc::new(Self {
            target,
            downstream,
            upstream,
            status: Cell::new(SessionStatus::Waiting),
            requesters: RefCell::new(vec![requester]),
            touched: Cell::new(now),
        })
    }

    pub fn target(&self) -> Ipv6Addr {
        self.target
    }

    pub fn status(&self) -> SessionStatus {
        self.status.get()
    }

    pub fn upstream(&self) -> LinkId {
        self.upstream
    }

    /// Remember another host waiting for the answer.
    pub fn add_requester(&self, requester: Ipv6Addr) {
        let mut requesters = self.requesters.borrow_mut();
        if !requesters.contains(&requester) {
            requesters.push(requester);
        }
    }

    /// Hosts still waiting for the answer.
    pub fn requesters(&self) -> Vec<Ipv6Addr> {
        self.requesters.borrow().clone()
    }

    /// Apply the timeout and time to live as of `now`.
    pub fn expire(&self, now: Instant, timeout: Duration, ttl: Duration) -> Expiry {
        let age = now.saturating_duration_since(self.touched.get());

        if age >= ttl {
            return Expiry::Drop;
        }

        if self.status.get() == SessionStatus::Waiting && age >= timeout {
            self.status.set(SessionStatus::Invalid);
            self.requesters.borrow_mut().clear();
            return Expiry::Invalidated;
        }

        Expiry::Keep
    }
}

impl<I: NetIo> Session<I> for ProxySession {
    fn target(&self) -> Ipv6Addr {
        self.target
    }

    fn status(&self) -> SessionStatus {
        self.status.get()
    }

    fn on_advert(&self, registry: &mut Registry<I>, link: LinkId, advert: Advert) {
        debug!(
            target = %self.target,
            link = %link,
            source = %advert.source,
            "target advertised upstream"
        );

        self.status.set(SessionStatus::Valid);
        self.touched.set(Instant::now());

        let requesters = self.requesters.take();
        for requester in requesters {
            if let Err(e) = registry.transmit_advert(self.downstream, requester, self.target) {
                warn!(target = %self.target, requester = %requester, error = %e, "could not answer");
            }
        }
    }
}
