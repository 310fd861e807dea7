//! Kernel packet filters.
//!
//! Two filters keep unwanted traffic out of user space:
//!
//! - the capture socket runs a classic BPF program that only accepts
//!   Ethernet frames carrying an ICMPv6 Neighbor Solicitation;
//! - the ICMPv6 socket uses the protocol-level `ICMP6_FILTER` option to
//!   pass only Neighbor Advertisements.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::wire::{
    ETH_HLEN, ETH_TYPE_OFFSET, ETHERTYPE_IPV6, ICMPV6_TYPE_OFFSET, IPPROTO_ICMPV6, IPV6_HLEN,
    IPV6_NEXT_HEADER_OFFSET, ND_NEIGHBOR_SOLICIT,
};

// BPF instruction classes and modes (from linux/bpf_common.h)
pub const BPF_LD: u16 = 0x00;
pub const BPF_JMP: u16 = 0x05;
pub const BPF_RET: u16 = 0x06;
pub const BPF_H: u16 = 0x08;
pub const BPF_B: u16 = 0x10;
pub const BPF_ABS: u16 = 0x20;
pub const BPF_JEQ: u16 = 0x10;
pub const BPF_K: u16 = 0x00;

/// Classic BPF instruction (mirrors struct sock_filter).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SockFilter {
    /// Opcode.
    pub code: u16,
    /// Jump offset if true.
    pub jt: u8,
    /// Jump offset if false.
    pub jf: u8,
    /// Generic multiuse field.
    pub k: u32,
}

impl SockFilter {
    /// Size of one instruction.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// A non-jump statement.
    pub const fn stmt(code: u16, k: u32) -> Self {
        Self {
            code,
            jt: 0,
            jf: 0,
            k,
        }
    }

    /// A conditional jump.
    pub const fn jump(code: u16, k: u32, jt: u8, jf: u8) -> Self {
        Self { code, jt, jf, k }
    }

    /// Convert to the libc representation passed to `SO_ATTACH_FILTER`.
    pub fn to_libc(self) -> libc::sock_filter {
        libc::sock_filter {
            code: self.code,
            jt: self.jt,
            jf: self.jf,
            k: self.k,
        }
    }
}

/// Number of instructions in the capture filter.
pub const NS_CAPTURE_FILTER_LEN: usize = 8;

/// Build the capture-socket filter program.
///
/// Accepts a frame only if the EtherType is IPv6, the IPv6 next header is
/// ICMPv6 and the ICMPv6 type is Neighbor Solicitation. The IPv6 header is
/// assumed to carry no extension headers.
pub const fn build_ns_capture_filter() -> [SockFilter; NS_CAPTURE_FILTER_LEN] {
    [
        // Load the EtherType.
        SockFilter::stmt(BPF_LD | BPF_H | BPF_ABS, ETH_TYPE_OFFSET as u32),
        // Drop unless IPv6.
        SockFilter::jump(BPF_JMP | BPF_JEQ | BPF_K, ETHERTYPE_IPV6 as u32, 0, 5),
        // Load the next header.
        SockFilter::stmt(
            BPF_LD | BPF_B | BPF_ABS,
            (ETH_HLEN + IPV6_NEXT_HEADER_OFFSET) as u32,
        ),
        // Drop unless ICMPv6.
        SockFilter::jump(BPF_JMP | BPF_JEQ | BPF_K, IPPROTO_ICMPV6 as u32, 0, 3),
        // Load the ICMPv6 type.
        SockFilter::stmt(
            BPF_LD | BPF_B | BPF_ABS,
            (ETH_HLEN + IPV6_HLEN + ICMPV6_TYPE_OFFSET) as u32,
        ),
        // Drop unless Neighbor Solicitation.
        SockFilter::jump(BPF_JMP | BPF_JEQ | BPF_K, ND_NEIGHBOR_SOLICIT as u32, 0, 1),
        // Keep the whole packet.
        SockFilter::stmt(BPF_RET | BPF_K, u32::MAX),
        // Drop.
        SockFilter::stmt(BPF_RET | BPF_K, 0),
    ]
}

/// ICMPv6 type filter (mirrors struct icmp6_filter).
///
/// A set bit blocks the corresponding ICMPv6 type.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Icmp6Filter {
    data: [u32; 8],
}

impl Icmp6Filter {
    /// A filter that blocks every type.
    pub const fn block_all() -> Self {
        Self { data: [u32::MAX; 8] }
    }

    /// Let `kind` through.
    pub fn pass(mut self, kind: u8) -> Self {
        self.data[usize::from(kind >> 5)] &= !(1u32 << (kind & 31));
        self
    }
}

/// Filter for the ICMPv6 socket: Neighbor Advertisements only.
pub fn advert_only_filter() -> Icmp6Filter {
    Icmp6Filter::block_all().pass(super::wire::ND_NEIGHBOR_ADVERT)
}
