//! IPDB binary database access.
//!
//! An IPDB file is a JSON descriptor followed by a binary bit-trie over
//! IPv6 address space, with IPv4 data grafted in at the canonical
//! IPv4-mapped-IPv6 position.
//!
//! # File structure
//!
//! ```text
//! +----------------------+
//! |  LENGTH (4 bytes BE) |
//! +----------------------+
//! |  JSON DESCRIPTOR     |  build, ip_version, node_count, fields, ...
//! +----------------------+
//! |  NODE ARRAY          |  node_count x 8 bytes (two BE child pointers)
//! +----------------------+
//! |  LEAF PAYLOADS       |  2-byte BE length + UTF-8 labels, tab-separated
//! +----------------------+
//! ```
//!
//! A child pointer `p` is an internal node index when `p < node_count`,
//! absent when `p == node_count` (or zero), and a leaf reference when
//! `p > node_count`: the leaf record starts at body offset
//! `(p - node_count) + 8 * node_count`.

mod format;
mod reader;
mod writer;

#[cfg(test)]
mod tests;

pub use format::GZIP_MAGIC;
pub use reader::IpdbReader;
pub use writer::IpdbWriter;
