//! Neighbor Solicitation / Neighbor Advertisement wire codec.
//!
//! Solicitations are captured off a packet socket and arrive as full
//! Ethernet frames. Advertisements arrive on the raw ICMPv6 socket, where
//! the kernel has already stripped the Ethernet and IPv6 headers.
//! Outbound messages are ICMPv6 bodies only: the kernel builds the IPv6
//! header and fills in the checksum for raw ICMPv6 sockets.
//!
//! Fields are read and written at named offsets over plain byte slices;
//! every reader checks the length first.

use std::net::Ipv6Addr;

use bytes::{BufMut, BytesMut};

use super::error::{Error, Result};
use crate::util::MacAddr;

/// Ethernet header length.
pub const ETH_HLEN: usize = 14;
/// Offset of the EtherType within the Ethernet header.
pub const ETH_TYPE_OFFSET: usize = 12;
/// EtherType for IPv6.
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

/// IPv6 fixed header length.
pub const IPV6_HLEN: usize = 40;
/// Offset of the next-header field within the IPv6 header.
pub const IPV6_NEXT_HEADER_OFFSET: usize = 6;
/// Offset of the source address within the IPv6 header.
pub const IPV6_SRC_OFFSET: usize = 8;
/// Offset of the destination address within the IPv6 header.
pub const IPV6_DST_OFFSET: usize = 24;
/// IPv6 next-header value for ICMPv6.
pub const IPPROTO_ICMPV6: u8 = 58;

/// ICMPv6 header length (type, code, checksum, 4 bytes of body).
pub const ICMPV6_HLEN: usize = 8;
/// Offset of the type byte within the ICMPv6 header.
pub const ICMPV6_TYPE_OFFSET: usize = 0;

/// ICMPv6 type of a Neighbor Solicitation.
pub const ND_NEIGHBOR_SOLICIT: u8 = 135;
/// ICMPv6 type of a Neighbor Advertisement.
pub const ND_NEIGHBOR_ADVERT: u8 = 136;

/// Offset of the NA flags byte.
pub const ND_NA_FLAGS_OFFSET: usize = 4;
/// NA "router" flag.
pub const ND_NA_FLAG_ROUTER: u8 = 0x80;
/// NA "solicited" flag.
pub const ND_NA_FLAG_SOLICITED: u8 = 0x40;

/// Offset of the target address in both NS and NA bodies.
pub const ND_TARGET_OFFSET: usize = 8;
/// Length of an NS or NA body without options.
pub const ND_MSG_LEN: usize = ND_TARGET_OFFSET + 16;

/// Source link-layer address option.
pub const ND_OPT_SOURCE_LINKADDR: u8 = 1;
/// Target link-layer address option.
pub const ND_OPT_TARGET_LINKADDR: u8 = 2;
/// Length of a link-layer address option, in units of 8 bytes.
pub const ND_OPT_LINKADDR_UNITS: u8 = 1;
/// Length of a link-layer address option in bytes.
pub const ND_OPT_LINKADDR_LEN: usize = 8;

/// Minimum captured frame holding a complete solicitation.
pub const MIN_SOLICIT_FRAME: usize = ETH_HLEN + IPV6_HLEN + ND_MSG_LEN;

/// Solicited-node multicast prefix, `ff02::1:ff00:0/104`.
const SOLICITED_NODE_PREFIX: [u8; 13] = [
    0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xff,
];

/// A decoded Neighbor Solicitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solicit {
    /// IPv6 source of the solicitation.
    pub source: Ipv6Addr,
    /// IPv6 destination (usually a solicited-node group).
    pub destination: Ipv6Addr,
    /// The address being resolved.
    pub target: Ipv6Addr,
}

/// A decoded Neighbor Advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advert {
    /// Transport-level peer that sent the advertisement.
    pub source: Ipv6Addr,
    /// The address being advertised.
    pub target: Ipv6Addr,
}

fn read_ipv6(buf: &[u8], offset: usize) -> Option<Ipv6Addr> {
    let octets: [u8; 16] = buf.get(offset..offset + 16)?.try_into().ok()?;
    Some(Ipv6Addr::from(octets))
}

fn truncated(expected: usize, buf: &[u8]) -> Error {
    Error::Truncated {
        expected,
        actual: buf.len(),
    }
}

/// Decode a Neighbor Solicitation from a captured Ethernet frame.
///
/// Source and destination come from the IPv6 header, the target from the
/// NS body.
pub fn decode_solicit(frame: &[u8]) -> Result<Solicit> {
    if frame.len() < MIN_SOLICIT_FRAME {
        return Err(truncated(MIN_SOLICIT_FRAME, frame));
    }

    let ip6 = &frame[ETH_HLEN..];
    let icmp6 = &ip6[IPV6_HLEN..];

    let kind = icmp6[ICMPV6_TYPE_OFFSET];
    if kind != ND_NEIGHBOR_SOLICIT {
        return Err(Error::UnexpectedType {
            expected: ND_NEIGHBOR_SOLICIT,
            actual: kind,
        });
    }

    let source = read_ipv6(ip6, IPV6_SRC_OFFSET).ok_or_else(|| truncated(MIN_SOLICIT_FRAME, frame))?;
    let destination =
        read_ipv6(ip6, IPV6_DST_OFFSET).ok_or_else(|| truncated(MIN_SOLICIT_FRAME, frame))?;
    let target =
        read_ipv6(icmp6, ND_TARGET_OFFSET).ok_or_else(|| truncated(MIN_SOLICIT_FRAME, frame))?;

    Ok(Solicit {
        source,
        destination,
        target,
    })
}

/// Decode the target of a Neighbor Advertisement from an ICMPv6 datagram.
///
/// The kernel filter only passes advertisements, but the type byte is
/// checked anyway.
pub fn decode_advert(datagram: &[u8]) -> Result<Ipv6Addr> {
    if datagram.len() < ICMPV6_HLEN {
        return Err(truncated(ICMPV6_HLEN, datagram));
    }

    let kind = datagram[ICMPV6_TYPE_OFFSET];
    if kind != ND_NEIGHBOR_ADVERT {
        return Err(Error::UnexpectedType {
            expected: ND_NEIGHBOR_ADVERT,
            actual: kind,
        });
    }

    read_ipv6(datagram, ND_TARGET_OFFSET).ok_or_else(|| truncated(ND_MSG_LEN, datagram))
}

/// Solicited-node multicast group for `target`: `ff02::1:ffXX:XXXX`
/// carrying the low 24 bits of the target.
pub fn solicited_node(target: Ipv6Addr) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets[..13].copy_from_slice(&SOLICITED_NODE_PREFIX);
    octets[13..].copy_from_slice(&target.octets()[13..]);
    Ipv6Addr::from(octets)
}

fn put_linkaddr_option(buf: &mut BytesMut, kind: u8, hwaddr: MacAddr) {
    buf.put_u8(kind);
    buf.put_u8(ND_OPT_LINKADDR_UNITS);
    buf.put_slice(&hwaddr.octets());
}

/// Encode a Neighbor Solicitation for `target`.
///
/// Returns the solicited-node destination and the ICMPv6 body, which
/// carries a source link-layer address option with `hwaddr`.
pub fn encode_solicit(target: Ipv6Addr, hwaddr: MacAddr) -> (Ipv6Addr, BytesMut) {
    let mut buf = BytesMut::with_capacity(ND_MSG_LEN + ND_OPT_LINKADDR_LEN);

    buf.put_u8(ND_NEIGHBOR_SOLICIT);
    buf.put_u8(0); // code
    buf.put_u16(0); // checksum, filled in by the kernel
    buf.put_u32(0); // reserved
    buf.put_slice(&target.octets());
    put_linkaddr_option(&mut buf, ND_OPT_SOURCE_LINKADDR, hwaddr);

    (solicited_node(target), buf)
}

/// Encode a Neighbor Advertisement for `target` with the solicited and
/// router flags set and a target link-layer address option with `hwaddr`.
pub fn encode_advert(target: Ipv6Addr, hwaddr: MacAddr) -> BytesMut {
    let mut buf = BytesMut::with_capacity(ND_MSG_LEN + ND_OPT_LINKADDR_LEN);

    buf.put_u8(ND_NEIGHBOR_ADVERT);
    buf.put_u8(0); // code
    buf.put_u16(0); // checksum, filled in by the kernel
    buf.put_u8(ND_NA_FLAG_SOLICITED | ND_NA_FLAG_ROUTER);
    buf.put_bytes(0, 3); // reserved
    buf.put_slice(&target.octets());
    put_linkaddr_option(&mut buf, ND_OPT_TARGET_LINKADDR, hwaddr);

    buf
}

/// Build a full captured-style Ethernet frame around an ICMPv6 body.
///
/// This is what the capture socket hands to [`decode_solicit`]; it is
/// used to synthesise frames for tests and replay.
pub fn build_frame(
    src_mac: MacAddr,
    dst_mac: MacAddr,
    source: Ipv6Addr,
    destination: Ipv6Addr,
    icmp6: &[u8],
) -> BytesMut {
    let mut buf = BytesMut::with_capacity(ETH_HLEN + IPV6_HLEN + icmp6.len());

    buf.put_slice(&dst_mac.octets());
    buf.put_slice(&src_mac.octets());
    buf.put_u16(ETHERTYPE_IPV6);

    buf.put_u32(0x6000_0000); // version 6, no traffic class or flow label
    buf.put_u16(icmp6.len() as u16);
    buf.put_u8(IPPROTO_ICMPV6);
    buf.put_u8(255); // hop limit
    buf.put_slice(&source.octets());
    buf.put_slice(&destination.octets());

    buf.put_slice(icmp6);
    buf
}
