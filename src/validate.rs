//! Sampling checker for emitted route files.
//!
//! Re-opens the database the files were generated from, samples
//! addresses out of every CIDR and verifies the classification rule:
//! a non-mainland file must contain no mainland or reserved address,
//! a mainland file no non-mainland or reserved address.

use ipnet::IpNet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use crate::classify::{classify_labels, is_reserved, Region};
use crate::ipdb::IpdbReader;
use crate::merge::net_interval;
use crate::range::AddressFamily;
use crate::{Error, Result};

/// `route <CIDR> via "<iface>";`
static ROUTE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*route\s+([0-9a-fA-F:.]+/\d+)\s+via\s+"[^"]+"\s*;\s*$"#)
        .expect("route line pattern")
});

/// Which rule the file under check must obey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    NonMainland,
    Mainland,
}

/// Outcome of checking one file.
#[derive(Debug)]
pub struct ValidationReport {
    pub kind: FileKind,
    pub total_cidrs: usize,
    pub samples_checked: usize,
    /// Samples whose label row classified as mainland
    pub mainland_hits: usize,
    /// Samples whose label row classified as anything else
    pub non_mainland_hits: usize,
    /// Samples inside a reserved block
    pub reserved_hits: usize,
    /// Samples with no covering leaf in the database
    pub unmatched: usize,
    /// Up to [`MAX_EXAMPLES`] offending samples for the report
    pub examples: Vec<String>,
}

/// Cap on recorded offending samples.
pub const MAX_EXAMPLES: usize = 10;

impl ValidationReport {
    fn new(kind: FileKind) -> Self {
        Self {
            kind,
            total_cidrs: 0,
            samples_checked: 0,
            mainland_hits: 0,
            non_mainland_hits: 0,
            reserved_hits: 0,
            unmatched: 0,
            examples: Vec::new(),
        }
    }

    /// Whether the file obeys its classification rule.
    pub fn passed(&self) -> bool {
        match self.kind {
            FileKind::NonMainland => self.mainland_hits == 0 && self.reserved_hits == 0,
            FileKind::Mainland => self.non_mainland_hits == 0 && self.reserved_hits == 0,
        }
    }

    fn record_example(&mut self, text: String) {
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.push(text);
        }
    }
}

/// Sampling checker bound to an open database.
pub struct Validator<'a> {
    reader: &'a IpdbReader,
    samples_per_cidr: usize,
}

impl<'a> Validator<'a> {
    pub fn new(reader: &'a IpdbReader, samples_per_cidr: usize) -> Self {
        Self {
            reader,
            samples_per_cidr: samples_per_cidr.max(1),
        }
    }

    /// Check every CIDR in a route file against the database.
    pub fn check_file(&self, path: &Path, kind: FileKind) -> Result<ValidationReport> {
        let cidrs = extract_cidrs(path)?;
        let mut report = ValidationReport::new(kind);
        report.total_cidrs = cidrs.len();

        for cidr in &cidrs {
            for addr in sample_addresses(cidr, self.samples_per_cidr) {
                report.samples_checked += 1;
                self.check_sample(addr, &mut report)?;
            }
        }

        Ok(report)
    }

    fn check_sample(&self, addr: IpAddr, report: &mut ValidationReport) -> Result<()> {
        let (value, family) = crate::range::addr_to_int(addr);

        if is_reserved(family, value) {
            report.reserved_hits += 1;
            report.record_example(format!("{addr} -> reserved block"));
            return Ok(());
        }

        match self.reader.lookup(addr)? {
            None => report.unmatched += 1,
            Some(labels) => match classify_labels(&labels) {
                Region::Mainland => {
                    report.mainland_hits += 1;
                    if report.kind == FileKind::NonMainland {
                        report.record_example(format!("{addr} -> {}", labels.join(", ")));
                    }
                }
                _ => {
                    report.non_mainland_hits += 1;
                    if report.kind == FileKind::Mainland {
                        report.record_example(format!("{addr} -> {}", labels.join(", ")));
                    }
                }
            },
        }

        Ok(())
    }
}

/// Pull every CIDR out of an emitted file, whichever flavor it is.
///
/// Understands `route ... via "...";` lines, `define NAME = [ ... ];`
/// blocks and plain one-per-line lists. Comments and blank lines are
/// skipped; anything else must parse as a CIDR.
pub fn extract_cidrs(path: &Path) -> Result<Vec<IpNet>> {
    let content = fs::read_to_string(path)?;
    let mut cidrs = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with("define") || line == "];" {
            continue;
        }

        if let Some(caps) = ROUTE_LINE.captures(line) {
            let text = &caps[1];
            let net = text
                .parse()
                .map_err(|_| Error::InvalidCidr(text.to_string()))?;
            cidrs.push(net);
            continue;
        }

        let text = line.trim_end_matches(',');
        let net = text
            .parse()
            .map_err(|_| Error::InvalidCidr(text.to_string()))?;
        cidrs.push(net);
    }

    Ok(cidrs)
}

/// Deterministic per-CIDR samples: the first address, evenly spaced
/// interior points and the last address. Blocks no larger than the
/// sample budget are enumerated completely.
pub fn sample_addresses(net: &IpNet, samples: usize) -> Vec<IpAddr> {
    let (lo, hi) = net_interval(net);
    let family = match net {
        IpNet::V4(_) => AddressFamily::V4,
        IpNet::V6(_) => AddressFamily::V6,
    };

    // Inclusive size; the full IPv6 space wraps to zero and is treated
    // as "larger than any budget".
    let size = hi.wrapping_sub(lo).wrapping_add(1);
    let exhaustive = size != 0 && size <= samples as u128;

    if exhaustive {
        return (0..size).map(|i| family.int_to_addr(lo + i)).collect();
    }
    if samples == 1 {
        return vec![family.int_to_addr(lo)];
    }

    let mut out = Vec::with_capacity(samples);
    out.push(family.int_to_addr(lo));

    let span = hi.wrapping_sub(lo);
    let step = span / (samples as u128 - 1);
    for i in 1..samples as u128 - 1 {
        out.push(family.int_to_addr(lo + i * step));
    }

    out.push(family.int_to_addr(hi));
    out
}
