//! Shared utilities for ndproxy.

pub mod addr;
pub mod ifname;

pub use addr::{MacAddr, format_mac, ipv6_in_prefix, parse_prefix};
