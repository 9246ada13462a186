//! NCHNRoutes - non-mainland-China routing table generation.
//!
//! This crate reads an IPDB binary geolocation database and produces
//! BIRD routing artifacts: the set of CIDR blocks covering every IP
//! range that is not mainland China (and not reserved space), and the
//! parallel mainland set.
//!
//! # Features
//!
//! - **IPDB trie extraction**: decode the descriptor and walk the
//!   on-disk bit-trie, enumerating IPv4 and IPv6 prefixes with their
//!   label rows
//! - **Classification**: mainland / Hong Kong / Macao / Taiwan /
//!   reserved / other, with per-family statistics
//! - **CIDR aggregation**: merge touching ranges and decompose each
//!   merged interval into its minimal CIDR cover
//! - **Parallel pipeline**: both families run concurrently and
//!   classification fans out across worker threads on large inputs
//! - **Sampling checker**: verify emitted files against the database
//!   they were generated from
//!
//! # Quick Start
//!
//! ```ignore
//! use nchnroutes::{pipeline, BirdFlavor, IpdbReader};
//! use std::path::Path;
//!
//! let reader = IpdbReader::open(Path::new("city.free.ipdb"))?;
//! let out = pipeline::run(&reader, true)?;
//!
//! let flavor = BirdFlavor::Route { iface: "wg0".to_string() };
//! nchnroutes::output::save_bird_config(
//!     Path::new("bird_v4.conf"),
//!     &out.v4.non_mainland,
//!     nchnroutes::AddressFamily::V4,
//!     &flavor,
//! )?;
//! ```

mod error;
mod metadata;

pub mod classify;
pub mod ipdb;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod range;
pub mod validate;

// Re-export core types
pub use error::{Error, Result};
pub use metadata::Metadata;

pub use classify::{ClassifyStats, Region};
pub use ipdb::{IpdbReader, IpdbWriter};
pub use output::BirdFlavor;
pub use pipeline::{FamilyOutput, PipelineOutput};
pub use range::{AddressFamily, IpRange};
pub use validate::{FileKind, ValidationReport, Validator};
