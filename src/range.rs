//! Address families, integer address arithmetic and labeled IP ranges.
//!
//! Both families are carried as unsigned 128-bit integers; IPv4 values
//! occupy the low 32 bits. All interval math downstream (aggregation,
//! normalization) runs on these integers.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Address family of a range or CIDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Address width in bits.
    pub fn width(self) -> u32 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    /// Largest representable address as an integer.
    pub fn max_int(self) -> u128 {
        match self {
            AddressFamily::V4 => u32::MAX as u128,
            AddressFamily::V6 => u128::MAX,
        }
    }

    /// Convert an integer back to an address of this family.
    ///
    /// IPv4 values must fit in the low 32 bits; higher bits are masked off.
    pub fn int_to_addr(self, v: u128) -> IpAddr {
        match self {
            AddressFamily::V4 => IpAddr::V4(Ipv4Addr::from(v as u32)),
            AddressFamily::V6 => IpAddr::V6(Ipv6Addr::from(v)),
        }
    }

    /// Trailing zero count of `v`, clamped to the family width.
    ///
    /// `trailing_zeros(0)` is defined as the full width, so a range that
    /// starts at address zero can absorb any block size.
    pub fn trailing_zeros(self, v: u128) -> u32 {
        if v == 0 {
            self.width()
        } else {
            v.trailing_zeros().min(self.width())
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// Convert an address to its integer form and family.
pub fn addr_to_int(addr: IpAddr) -> (u128, AddressFamily) {
    match addr {
        IpAddr::V4(v4) => (u32::from(v4) as u128, AddressFamily::V4),
        IpAddr::V6(v6) => (u128::from(v6), AddressFamily::V6),
    }
}

/// A prefix-aligned inclusive address range with its label row.
///
/// `first <= last` always holds, and both ends sit on a single CIDR
/// boundary: ranges come out of the trie one leaf at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRange {
    pub family: AddressFamily,
    /// First address, inclusive
    pub first: u128,
    /// Last address, inclusive
    pub last: u128,
    /// Tab-separated label fields, owned independently of the database buffer
    pub labels: Vec<String>,
}

impl IpRange {
    /// Build a range from a prefix already positioned at the top of the
    /// family width (host bits zero) and its prefix length.
    pub fn from_prefix(
        family: AddressFamily,
        prefix: u128,
        prefix_len: u32,
        labels: Vec<String>,
    ) -> Self {
        let host_bits = family.width() - prefix_len;
        let last = if host_bits == 0 {
            prefix
        } else if host_bits == 128 {
            u128::MAX
        } else {
            prefix | ((1u128 << host_bits) - 1)
        };
        Self {
            family,
            first: prefix,
            last,
            labels,
        }
    }

    /// First address in display form.
    pub fn first_addr(&self) -> IpAddr {
        self.family.int_to_addr(self.first)
    }

    /// Last address in display form.
    pub fn last_addr(&self) -> IpAddr {
        self.family.int_to_addr(self.last)
    }
}

/// Ordered, disjoint collection of ranges.
///
/// Built by appending classifier output in extractor order; sibling
/// leaves of a bit-trie never overlap, so appending preserves both
/// invariants without any re-sorting.
#[derive(Debug, Default)]
pub struct RangeSet {
    ranges: Vec<IpRange>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a range. Callers must append in ascending first-address order.
    pub fn push(&mut self, range: IpRange) {
        debug_assert!(
            self.ranges.last().map_or(true, |prev| prev.last < range.first),
            "range set must stay sorted and disjoint"
        );
        self.ranges.push(range);
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn as_slice(&self) -> &[IpRange] {
        &self.ranges
    }

    pub fn into_vec(self) -> Vec<IpRange> {
        self.ranges
    }

    /// Concatenate another set produced from a later input chunk.
    pub fn extend(&mut self, other: RangeSet) {
        for range in other.ranges {
            self.push(range);
        }
    }
}
