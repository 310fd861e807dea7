//! IPv6 Neighbor Discovery proxy core for Linux.
//!
//! This crate owns the network-facing half of an NDP proxy: the raw
//! sockets of every monitored link, the kernel packet filters installed
//! on them, the Neighbor Solicitation / Neighbor Advertisement codec and
//! the single-threaded event loop that multiplexes all links.
//!
//! Deciding *whether* a target should be proxied is left to the caller,
//! which plugs in through the [`ndp::SolicitHandler`] and [`ndp::Session`]
//! traits.
//!
//! # Example
//!
//! ```ignore
//! use ndproxy::ndp::{Registry, SystemIo};
//!
//! let mut registry = Registry::new(SystemIo::new());
//! let eth0 = registry.open_capture_socket("eth0")?;
//! registry.set_handler(eth0, my_policy)?;
//!
//! loop {
//!     registry.poll_once()?;
//!     // periodic session housekeeping goes here
//! }
//! ```

pub mod ndp;
pub mod util;

pub use ndp::{Error, LinkId, Registry, Result};
