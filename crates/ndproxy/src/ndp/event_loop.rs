//! One cycle of the event loop.

use std::time::Duration;

use tracing::{error, trace, warn};

use super::error::{Error, Result};
use super::io::NetIo;
use super::link::LinkId;
use super::poll::SlotKind;
use super::registry::Registry;

/// Upper bound on a single wait.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Sleep used instead of waiting while no link is registered.
pub const IDLE_BACKOFF: Duration = Duration::from_secs(1);

impl<I: NetIo> Registry<I> {
    /// Wait for readable sockets and dispatch what arrived.
    ///
    /// Advertisements go to the first waiting session on the receiving
    /// link whose target matches; solicitations go to the link's handler.
    /// Slots are handled in registration order, ICMPv6 before capture per
    /// link. Packets that fail to decode are logged and dropped.
    ///
    /// Returns after at most [`POLL_TIMEOUT`] when links are registered,
    /// or after [`IDLE_BACKOFF`] when none are. Only a failure of the wait
    /// itself is an error.
    pub fn poll_once(&mut self) -> Result<()> {
        if self.poll.is_empty() {
            self.io.idle(IDLE_BACKOFF);
            return Ok(());
        }

        let ready = self
            .io
            .wait(self.poll.entries_mut(), POLL_TIMEOUT)
            .map_err(|e| {
                error!(error = %e, "wait failed");
                Error::Wait(e)
            })?;

        if ready == 0 {
            return Ok(());
        }

        // Handlers may add or remove links; dispatch from a snapshot.
        for (id, kind) in self.poll.ready() {
            let result = match kind {
                SlotKind::Icmp => self.dispatch_advert(id),
                SlotKind::Capture => self.dispatch_solicit(id),
            };

            match result {
                Ok(()) => {}
                Err(e) if e.is_would_block() => trace!(link = %id, "spurious wakeup"),
                Err(Error::LinkNotFound(_)) => trace!(link = %id, "link removed during dispatch"),
                Err(e) => warn!(link = %id, slot = ?kind, error = %e, "dropped packet"),
            }
        }

        Ok(())
    }

    fn dispatch_advert(&mut self, id: LinkId) -> Result<()> {
        let advert = self.receive_advert(id)?;

        let Some(session) = self.link(id)?.waiting_session(advert.target) else {
            trace!(link = %id, target = %advert.target, "no waiting session");
            return Ok(());
        };

        session.on_advert(self, id, advert);
        Ok(())
    }

    fn dispatch_solicit(&mut self, id: LinkId) -> Result<()> {
        let solicit = self.receive_solicit(id)?;

        let Some(handler) = self.link(id)?.handler().cloned() else {
            trace!(link = %id, target = %solicit.target, "no handler");
            return Ok(());
        };

        handler.on_solicit(self, id, solicit);
        Ok(())
    }
}
