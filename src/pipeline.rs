//! Pipeline orchestration: extract, classify, aggregate, normalize.
//!
//! The IPv4 and IPv6 halves are independent and run on separate
//! threads. Classification can additionally fan out across worker
//! threads on contiguous chunks of the extractor's output; chunk
//! results are concatenated in chunk order, which preserves the sorted
//! invariant the aggregator relies on.

use ipnet::IpNet;
use std::thread;

use crate::classify::{partition, ClassifyStats, Partition};
use crate::ipdb::IpdbReader;
use crate::merge::aggregate_and_normalize;
use crate::range::{AddressFamily, IpRange};
use crate::Result;

/// Minimum range count before classification fans out to workers.
pub const PARALLEL_THRESHOLD: usize = 1000;

/// Results for one address family.
#[derive(Debug)]
pub struct FamilyOutput {
    pub family: AddressFamily,
    /// Minimal CIDR cover of everything routed around the mainland
    pub non_mainland: Vec<IpNet>,
    /// Minimal CIDR cover of the mainland set
    pub mainland: Vec<IpNet>,
    pub stats: ClassifyStats,
}

/// Results for both families.
#[derive(Debug)]
pub struct PipelineOutput {
    pub v4: FamilyOutput,
    pub v6: FamilyOutput,
}

/// Run the full pipeline over an open database.
pub fn run(reader: &IpdbReader, parallel: bool) -> Result<PipelineOutput> {
    let (v4_ranges, v6_ranges) = reader.enumerate()?;
    log::debug!(
        "extracted {} IPv4 and {} IPv6 ranges",
        v4_ranges.len(),
        v6_ranges.len()
    );

    let (v4, v6) = thread::scope(|s| {
        let h4 = s.spawn(move || run_family(v4_ranges, AddressFamily::V4, parallel));
        let h6 = s.spawn(move || run_family(v6_ranges, AddressFamily::V6, parallel));
        (join_worker(h4), join_worker(h6))
    });

    Ok(PipelineOutput { v4, v6 })
}

/// Classify, aggregate and normalize one family's ranges.
pub fn run_family(ranges: Vec<IpRange>, family: AddressFamily, parallel: bool) -> FamilyOutput {
    let part = if parallel && ranges.len() >= PARALLEL_THRESHOLD {
        partition_parallel(ranges)
    } else {
        partition(ranges)
    };

    let non_mainland = aggregate_and_normalize(part.non_mainland.as_slice(), family);
    let mainland = aggregate_and_normalize(part.mainland.as_slice(), family);

    FamilyOutput {
        family,
        non_mainland,
        mainland,
        stats: part.stats,
    }
}

/// Fan classification out over contiguous chunks.
///
/// Workers share nothing: each owns its chunk and its own counters.
/// Joining in spawn order concatenates the chunk outputs back into the
/// original order, so the sorted-disjoint invariant survives.
fn partition_parallel(ranges: Vec<IpRange>) -> Partition {
    let workers = thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1)
        .min(ranges.len());
    if workers <= 1 {
        return partition(ranges);
    }

    let chunk_size = ranges.len().div_ceil(workers);
    let mut chunks = Vec::with_capacity(workers);
    let mut rest = ranges;
    while rest.len() > chunk_size {
        let tail = rest.split_off(chunk_size);
        chunks.push(rest);
        rest = tail;
    }
    chunks.push(rest);

    log::debug!(
        "classifying across {} workers ({} ranges per chunk)",
        chunks.len(),
        chunk_size
    );

    thread::scope(|s| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| s.spawn(move || partition(chunk)))
            .collect();

        let mut out = Partition::default();
        for handle in handles {
            out.extend(join_worker(handle));
        }
        out
    })
}

fn join_worker<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthetic /24 ranges alternating between mainland and foreign
    /// labels, with every 16th range inside reserved space.
    fn synthetic_ranges(count: usize) -> Vec<IpRange> {
        (0..count)
            .map(|i| {
                let labels = if i % 16 == 15 {
                    vec!["USA".to_string()]
                } else if i % 2 == 0 {
                    vec!["中国".to_string(), "北京".to_string()]
                } else {
                    vec!["USA".to_string(), "California".to_string()]
                };
                // Reserved hits land in 127.0.0.0/8
                let base = if i % 16 == 15 {
                    0x7F00_0000 + ((i as u128) << 8)
                } else {
                    0x0100_0000 + ((i as u128) << 8)
                };
                IpRange::from_prefix(AddressFamily::V4, base, 24, labels)
            })
            .collect()
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let ranges = synthetic_ranges(4096);

        let seq = partition(ranges.clone());
        let par = partition_parallel(ranges);

        assert_eq!(par.stats, seq.stats);
        assert_eq!(par.non_mainland.as_slice(), seq.non_mainland.as_slice());
        assert_eq!(par.mainland.as_slice(), seq.mainland.as_slice());
    }

    #[test]
    fn test_run_family_below_threshold() {
        let out = run_family(synthetic_ranges(8), AddressFamily::V4, true);
        assert_eq!(out.stats.total_ranges, 8);
        assert!(!out.non_mainland.is_empty());
        assert!(!out.mainland.is_empty());
    }

    #[test]
    fn test_run_family_empty() {
        let out = run_family(Vec::new(), AddressFamily::V6, true);
        assert_eq!(out.stats.total_ranges, 0);
        assert!(out.non_mainland.is_empty());
        assert!(out.mainland.is_empty());
    }
}
