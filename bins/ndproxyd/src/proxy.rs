//! The proxy policy: which solicitations to answer, and how.

use std::cell::RefCell;
use std::net::Ipv6Addr;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ndproxy::ndp::{NetIo, Session, SessionStatus, Solicit, SolicitHandler};
use ndproxy::{LinkId, Registry};
use tracing::{debug, info, trace, warn};

use crate::rule::{self, Action, Rule};
use crate::session::{Expiry, ProxySession};

/// Answers solicitations on the proxied link according to the rules,
/// probing upstream links for forwarded targets.
#[derive(Debug)]
pub struct Proxy {
    rules: Vec<Rule>,
    timeout: Duration,
    ttl: Duration,
    sessions: RefCell<Vec<Rc<ProxySession>>>,
}

impl Proxy {
    pub fn new(rules: Vec<Rule>, timeout: Duration, ttl: Duration) -> Self {
        Self {
            rules,
            timeout,
            ttl,
            sessions: RefCell::new(Vec::new()),
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.borrow().len()
    }

    fn find_session(&self, target: Ipv6Addr, upstream: LinkId) -> Option<Rc<ProxySession>> {
        self.sessions
            .borrow()
            .iter()
            .find(|s| s.target() == target && s.upstream() == upstream)
            .cloned()
    }

    fn forward<I: NetIo>(
        &self,
        registry: &mut Registry<I>,
        downstream: LinkId,
        upstream: &str,
        solicit: Solicit,
    ) {
        // Opening is idempotent; this retries upstreams that were down.
        let up = match registry.open_icmp_socket(upstream) {
            Ok(up) => up,
            Err(e) => {
                warn!(upstream, target = %solicit.target, error = %e, "upstream unavailable");
                return;
            }
        };

        if let Some(session) = self.find_session(solicit.target, up) {
            match session.status() {
                SessionStatus::Valid => {
                    if let Err(e) = registry.transmit_advert(downstream, solicit.source, solicit.target) {
                        warn!(target = %solicit.target, source = %solicit.source, error = %e, "could not answer");
                    }
                }
                SessionStatus::Waiting => {
                    session.add_requester(solicit.source);
                    trace!(
                        target = %solicit.target,
                        requesters = session.requesters().len(),
                        "probe already pending"
                    );
                }
                SessionStatus::Invalid => {
                    trace!(target = %solicit.target, "target known unreachable");
                }
            }
            return;
        }

        let session = ProxySession::new(solicit.target, downstream, up, solicit.source, Instant::now());
        if registry.attach_session(up, session.clone()).is_err() {
            return;
        }
        self.sessions.borrow_mut().push(session.clone());

        debug!(target = %solicit.target, upstream, "probing upstream");
        if let Err(e) = registry.transmit_solicit(up, solicit.target) {
            // Nothing went out; forget the session so the next NS is forwarded again.
            warn!(target = %solicit.target, upstream, error = %e, "solicit not sent");
            self.forget(registry, &session);
        }
    }

    fn forget<I: NetIo>(&self, registry: &mut Registry<I>, session: &Rc<ProxySession>) {
        self.sessions.borrow_mut().retain(|s| !Rc::ptr_eq(s, session));

        let upstream = session.upstream();
        let session: Rc<dyn Session<I>> = session.clone();
        if let Err(e) = registry.detach_session(upstream, &session) {
            trace!(error = %e, "upstream already gone");
        }
    }

    /// Time out waiting probes and drop sessions past their time to live.
    pub fn expire<I: NetIo>(&self, registry: &mut Registry<I>, now: Instant) {
        let mut dropped = Vec::new();

        self.sessions.borrow_mut().retain(|session| {
            match session.expire(now, self.timeout, self.ttl) {
                Expiry::Keep => true,
                Expiry::Invalidated => {
                    info!(target = %session.target(), "no answer from upstream");
                    true
                }
                Expiry::Drop => {
                    dropped.push(session.clone());
                    false
                }
            }
        });

        for session in dropped {
            trace!(target = %session.target(), status = %session.status(), "session expired");
            self.forget(registry, &session);
        }
    }
}

impl<I: NetIo> SolicitHandler<I> for Proxy {
    fn on_solicit(&self, registry: &mut Registry<I>, link: LinkId, solicit: Solicit) {
        if solicit.source.is_unspecified() {
            trace!(target = %solicit.target, "ignoring duplicate address detection");
            return;
        }

        let Some(rule) = rule::find(&self.rules, solicit.target) else {
            trace!(target = %solicit.target, "no matching rule");
            return;
        };

        match &rule.action {
            Action::Static => {
                debug!(target = %solicit.target, source = %solicit.source, "answering");
                if let Err(e) = registry.transmit_advert(link, solicit.source, solicit.target) {
                    warn!(target = %solicit.target, source = %solicit.source, error = %e, "could not answer");
                }
            }
            Action::Forward(upstream) => self.forward(registry, link, upstream, solicit),
        }
    }
}
