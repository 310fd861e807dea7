//! Hardware address and IPv6 prefix helpers.

use std::fmt;
use std::net::Ipv6Addr;

/// Error type for address parsing.
#[derive(Debug, thiserror::Error)]
pub enum AddrError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),
}

pub type Result<T> = std::result::Result<T, AddrError>;

/// A 6-byte Ethernet hardware address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The raw octets.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_mac(&self.0))
    }
}

/// Parse an IPv6 address with prefix length (CIDR notation).
///
/// A bare address is treated as a /128.
pub fn parse_prefix(s: &str) -> Result<(Ipv6Addr, u8)> {
    let (addr_str, prefix) = match s.split_once('/') {
        Some((addr_str, prefix_str)) => {
            let prefix: u8 = prefix_str
                .parse()
                .map_err(|_| AddrError::InvalidPrefix(prefix_str.to_string()))?;
            (addr_str, prefix)
        }
        None => (s, 128),
    };

    if prefix > 128 {
        return Err(AddrError::InvalidPrefix(format!(
            "{} exceeds maximum 128",
            prefix
        )));
    }

    let addr: Ipv6Addr = addr_str
        .parse()
        .map_err(|_| AddrError::InvalidAddress(addr_str.to_string()))?;

    Ok((addr, prefix))
}

/// Format a MAC address.
pub fn format_mac(bytes: &[u8]) -> String {
    if bytes.len() >= 6 {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
        )
    } else {
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Check if an IPv6 address is in a given prefix.
pub fn ipv6_in_prefix(addr: Ipv6Addr, prefix_addr: Ipv6Addr, prefix_len: u8) -> bool {
    if prefix_len == 0 {
        return true;
    }
    if prefix_len > 128 {
        return false;
    }

    let addr_bits = u128::from(addr);
    let prefix_bits = u128::from(prefix_addr);
    let mask = !0u128 << (128 - prefix_len);

    (addr_bits & mask) == (prefix_bits & mask)
}
