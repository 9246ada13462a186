//! Range classification: label heuristics, reserved-block tables and
//! per-family statistics.

use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::range::{AddressFamily, IpRange, RangeSet};

/// Reserved IPv4 blocks. Membership is tested on a range's first address.
static RESERVED_V4: Lazy<Vec<Ipv4Net>> = Lazy::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "224.0.0.0/4",
        "240.0.0.0/4",
    ]
    .iter()
    .map(|s| s.parse().expect("reserved block literal"))
    .collect()
});

/// Reserved IPv6 blocks.
static RESERVED_V6: Lazy<Vec<Ipv6Net>> = Lazy::new(|| {
    ["::1/128", "fe80::/10", "fc00::/7", "ff00::/8", "::/128"]
        .iter()
        .map(|s| s.parse().expect("reserved block literal"))
        .collect()
});

/// Label-derived classification of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// PRC proper, excluding Hong Kong, Macao and Taiwan
    Mainland,
    HongKong,
    Macao,
    Taiwan,
    Other,
}

/// Classify a tab-separated label row.
///
/// Column 0 is the country, column 1 (when present) the region. The
/// country match is exact; region matches are substring tests, since
/// database releases vary the surrounding text. An empty row is
/// `Other`.
pub fn classify_labels(labels: &[String]) -> Region {
    let country = labels.first().map(String::as_str).unwrap_or("");
    match country {
        "中国" | "CN" | "China" => {
            let region = labels.get(1).map(String::as_str).unwrap_or("");
            if region.contains("香港") || region.contains("Hong Kong") {
                Region::HongKong
            } else if region.contains("澳门")
                || region.contains("Macao")
                || region.contains("Macau")
            {
                Region::Macao
            } else if region.contains("台湾") || region.contains("Taiwan") {
                Region::Taiwan
            } else {
                Region::Mainland
            }
        }
        _ => Region::Other,
    }
}

/// Whether the address lies in a reserved block of its family.
pub fn is_reserved(family: AddressFamily, first: u128) -> bool {
    match family {
        AddressFamily::V4 => {
            let addr = Ipv4Addr::from(first as u32);
            RESERVED_V4.iter().any(|net| net.contains(&addr))
        }
        AddressFamily::V6 => {
            let addr = Ipv6Addr::from(first);
            RESERVED_V6.iter().any(|net| net.contains(&addr))
        }
    }
}

/// Per-family classification counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyStats {
    pub total_ranges: usize,
    /// Mainland label matches (whether or not the range was saved)
    pub china_filtered: usize,
    /// Mainland ranges that made it into the mainland route set
    pub china_saved: usize,
    /// Reserved ranges dropped from the non-mainland set
    pub private_filtered: usize,
    pub hong_kong_kept: usize,
    pub macao_kept: usize,
    pub taiwan_kept: usize,
    pub other_kept: usize,
}

impl ClassifyStats {
    /// Fold another worker's counters into this one.
    pub fn merge(&mut self, other: &ClassifyStats) {
        self.total_ranges += other.total_ranges;
        self.china_filtered += other.china_filtered;
        self.china_saved += other.china_saved;
        self.private_filtered += other.private_filtered;
        self.hong_kong_kept += other.hong_kong_kept;
        self.macao_kept += other.macao_kept;
        self.taiwan_kept += other.taiwan_kept;
        self.other_kept += other.other_kept;
    }
}

/// Classifier output: the two emitted range sets plus statistics.
#[derive(Debug, Default)]
pub struct Partition {
    pub non_mainland: RangeSet,
    pub mainland: RangeSet,
    pub stats: ClassifyStats,
}

impl Partition {
    /// Concatenate a partition built from a later input chunk.
    pub fn extend(&mut self, other: Partition) {
        self.non_mainland.extend(other.non_mainland);
        self.mainland.extend(other.mainland);
        self.stats.merge(&other.stats);
    }
}

/// Route every range into its bucket, preserving input order.
///
/// Mainland ranges go to the mainland set, Hong Kong / Macao / Taiwan /
/// other ranges to the non-mainland set; reserved address space is
/// dropped from both. A mainland label inside reserved space still
/// counts toward `china_filtered` but is never emitted.
pub fn partition(ranges: Vec<IpRange>) -> Partition {
    let mut out = Partition::default();

    for range in ranges {
        out.stats.total_ranges += 1;
        let reserved = is_reserved(range.family, range.first);

        match classify_labels(&range.labels) {
            Region::Mainland => {
                out.stats.china_filtered += 1;
                if !reserved {
                    out.stats.china_saved += 1;
                    out.mainland.push(range);
                }
            }
            region => {
                match region {
                    Region::HongKong => out.stats.hong_kong_kept += 1,
                    Region::Macao => out.stats.macao_kept += 1,
                    Region::Taiwan => out.stats.taiwan_kept += 1,
                    Region::Other => out.stats.other_kept += 1,
                    Region::Mainland => unreachable!(),
                }
                if reserved {
                    out.stats.private_filtered += 1;
                } else {
                    out.non_mainland.push(range);
                }
            }
        }
    }

    out
}
