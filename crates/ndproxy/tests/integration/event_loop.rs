//! Event loop integration tests.

use std::cell::Cell;
use std::net::Ipv6Addr;
use std::rc::Rc;

use ndproxy::ndp::{Advert, Session, SessionStatus, SystemIo};
use ndproxy::{LinkId, Registry, Result};

use crate::common::{LOOPBACK, registry};

struct Waiting {
    target: Ipv6Addr,
    adverts: Cell<usize>,
}

impl Session<SystemIo> for Waiting {
    fn target(&self) -> Ipv6Addr {
        self.target
    }

    fn status(&self) -> SessionStatus {
        SessionStatus::Waiting
    }

    fn on_advert(&self, _: &mut Registry<SystemIo>, _: LinkId, advert: Advert) {
        assert_eq!(advert.target, self.target);
        self.adverts.set(self.adverts.get() + 1);
    }
}

#[test]
fn test_idle_poll() -> Result<()> {
    require_root!();

    let mut registry = registry();
    registry.open_capture_socket(LOOPBACK)?;

    // Nothing solicits on loopback; the wait times out.
    registry.poll_once()?;
    Ok(())
}

#[test]
fn test_advert_over_loopback() -> Result<()> {
    require_root!();

    let mut registry = registry();
    let id = registry.open_icmp_socket(LOOPBACK)?;
    let target: Ipv6Addr = "2001:db8::1".parse().unwrap_or(Ipv6Addr::UNSPECIFIED);

    let session = Rc::new(Waiting {
        target,
        adverts: Cell::new(0),
    });
    registry.attach_session(id, session.clone())?;

    let sent = registry.transmit_advert(id, Ipv6Addr::LOCALHOST, target)?;
    assert_eq!(sent, 32);

    for _ in 0..20 {
        registry.poll_once()?;
        if session.adverts.get() > 0 {
            break;
        }
    }
    assert_eq!(session.adverts.get(), 1);

    Ok(())
}
