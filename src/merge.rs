//! Interval aggregation and minimal CIDR normalization.
//!
//! Both operate on inclusive `(first, last)` intervals over u128, which
//! covers either address family; the family only matters when turning
//! an interval back into CIDRs.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::range::{AddressFamily, IpRange};

/// Coalesce touching or overlapping ranges into maximal intervals.
///
/// The extractor already emits in ascending first-address order; the
/// sort here is a no-op in that case and keeps the contract honest for
/// other callers. Two intervals merge when the next one starts at or
/// before one past the current end.
pub fn aggregate(ranges: &[IpRange]) -> Vec<(u128, u128)> {
    if ranges.is_empty() {
        return Vec::new();
    }

    let mut intervals: Vec<(u128, u128)> = ranges.iter().map(|r| (r.first, r.last)).collect();
    intervals.sort_unstable_by_key(|&(first, _)| first);

    let mut out = Vec::new();
    let (mut lo, mut hi) = intervals[0];
    for &(first, last) in &intervals[1..] {
        if first.saturating_sub(1) <= hi {
            hi = hi.max(last);
        } else {
            out.push((lo, hi));
            lo = first;
            hi = last;
        }
    }
    out.push((lo, hi));
    out
}

/// Decompose one inclusive interval into the minimal ascending CIDR
/// cover.
///
/// Each step takes the largest block that both fits in the remaining
/// length and aligns on the current first address. The whole address
/// space wraps the length counter to zero and is the single `/0`.
pub fn normalize(first: u128, last: u128, family: AddressFamily) -> Vec<IpNet> {
    let width = family.width();
    let mut out = Vec::new();

    let mut first = first;
    let mut length = last.wrapping_sub(first).wrapping_add(1);

    if first == 0 && length == 0 {
        push_cidr(&mut out, family, 0, 0);
        return out;
    }

    while length > 0 {
        let block_bits = length.ilog2().min(family.trailing_zeros(first));
        push_cidr(&mut out, family, first, width - block_bits);

        let block = 1u128 << block_bits;
        length -= block;
        first = first.wrapping_add(block);
    }

    out
}

/// Aggregate a sorted range list and normalize every resulting interval.
pub fn aggregate_and_normalize(ranges: &[IpRange], family: AddressFamily) -> Vec<IpNet> {
    aggregate(ranges)
        .into_iter()
        .flat_map(|(first, last)| normalize(first, last, family))
        .collect()
}

/// Inclusive integer interval covered by a CIDR.
pub fn net_interval(net: &IpNet) -> (u128, u128) {
    match net {
        IpNet::V4(v4) => (
            u32::from(v4.network()) as u128,
            u32::from(v4.broadcast()) as u128,
        ),
        IpNet::V6(v6) => (u128::from(v6.network()), u128::from(v6.broadcast())),
    }
}

fn push_cidr(out: &mut Vec<IpNet>, family: AddressFamily, first: u128, prefix_len: u32) {
    match family {
        AddressFamily::V4 => {
            if let Ok(net) = Ipv4Net::new(Ipv4Addr::from(first as u32), prefix_len as u8) {
                out.push(IpNet::V4(net));
            }
        }
        AddressFamily::V6 => {
            if let Ok(net) = Ipv6Net::new(Ipv6Addr::from(first), prefix_len as u8) {
                out.push(IpNet::V6(net));
            }
        }
    }
}
