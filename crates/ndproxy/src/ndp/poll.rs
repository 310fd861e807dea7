//! The flat poll view over the registry.
//!
//! Every link contributes exactly two consecutive entries: slot `2k` is
//! link `k`'s ICMPv6 socket and slot `2k + 1` its capture socket, both
//! polled for readability. A socket that is not open is represented by a
//! negative descriptor, which `poll(2)` skips.

use std::fmt;
use std::os::unix::io::RawFd;

use super::link::LinkId;

/// Which of a link's two sockets a poll slot refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// The ICMPv6 socket (advertisements).
    Icmp,
    /// The capture socket (solicitations).
    Capture,
}

impl SlotKind {
    /// Kind of the slot at `index`: even slots are ICMPv6, odd slots capture.
    pub fn of(index: usize) -> Self {
        if index % 2 == 0 {
            SlotKind::Icmp
        } else {
            SlotKind::Capture
        }
    }
}

fn entry(fd: Option<RawFd>) -> libc::pollfd {
    libc::pollfd {
        fd: fd.unwrap_or(-1),
        events: libc::POLLIN,
        revents: 0,
    }
}

/// Poll entries for every link, in registry order.
#[derive(Default)]
pub struct PollSet {
    fds: Vec<libc::pollfd>,
    owners: Vec<LinkId>,
}

impl fmt::Debug for PollSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSet")
            .field("fds", &self.fds.iter().map(|p| p.fd).collect::<Vec<_>>())
            .field("owners", &self.owners)
            .finish()
    }
}

impl PollSet {
    /// Create an empty poll set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from `(link, icmp fd, capture fd)` triples in registry order.
    pub fn rebuild(&mut self, links: impl IntoIterator<Item = (LinkId, Option<RawFd>, Option<RawFd>)>) {
        self.fds.clear();
        self.owners.clear();

        for (id, icmp, capture) in links {
            self.fds.push(entry(icmp));
            self.fds.push(entry(capture));
            self.owners.push(id);
        }

        debug_assert_eq!(self.fds.len(), self.owners.len() * 2);
    }

    /// Number of entries (twice the number of links).
    pub fn len(&self) -> usize {
        self.fds.len()
    }

    /// Check if there is nothing to poll.
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Number of links covered.
    pub fn links(&self) -> usize {
        self.owners.len()
    }

    /// The raw entries.
    pub fn entries(&self) -> &[libc::pollfd] {
        &self.fds
    }

    /// The raw entries, for handing to `poll(2)`.
    pub fn entries_mut(&mut self) -> &mut [libc::pollfd] {
        &mut self.fds
    }

    /// Link and socket kind for the slot at `index`.
    pub fn slot(&self, index: usize) -> Option<(LinkId, SlotKind)> {
        let owner = *self.owners.get(index / 2)?;
        (index < self.fds.len()).then(|| (owner, SlotKind::of(index)))
    }

    /// Readable slots after a wait, in slot order.
    pub fn ready(&self) -> Vec<(LinkId, SlotKind)> {
        self.fds
            .iter()
            .enumerate()
            .filter(|(_, fd)| fd.revents & libc::POLLIN != 0)
            .filter_map(|(index, _)| self.slot(index))
            .collect()
    }
}
