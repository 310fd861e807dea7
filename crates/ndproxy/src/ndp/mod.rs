//! Neighbor Discovery proxy core.
//!
//! The pieces, leaf first:
//!
//! - [`wire`] encodes and decodes Neighbor Solicitation and Neighbor
//!   Advertisement messages.
//! - [`filter`] holds the kernel filter programs installed on each socket.
//! - [`socket`] is the OS boundary: raw sockets, ioctls and `poll(2)`.
//! - [`Registry`] owns every [`Link`] and its two sockets, and
//!   [`Registry::poll_once`] runs one cycle of the event loop.
//!
//! # Event Loop
//!
//! ```ignore
//! use ndproxy::ndp::{Registry, SystemIo};
//!
//! let mut registry = Registry::new(SystemIo::new());
//! let downstream = registry.open_capture_socket("eth0")?;
//! let upstream = registry.open_icmp_socket("eth1")?;
//!
//! loop {
//!     // Blocks for at most 50ms.
//!     registry.poll_once()?;
//! }
//! ```

mod error;
mod event_loop;
#[cfg(test)]
pub(crate) mod fake;
pub mod filter;
mod io;
mod link;
mod poll;
mod registry;
pub mod socket;
pub mod wire;

pub use error::{Error, Result};
pub use event_loop::{IDLE_BACKOFF, POLL_TIMEOUT};
pub use io::{NetIo, SystemIo};
pub use link::{Link, LinkId, Session, SessionStatus, SolicitHandler};
pub use poll::{PollSet, SlotKind};
pub use registry::{RECV_BUFFER, Registry};
pub use wire::{Advert, Solicit};
