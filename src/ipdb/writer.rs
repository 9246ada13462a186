//! IPDB image builder.
//!
//! Builds a well-formed database from `(prefix, labels)` entries, the
//! inverse of [`super::IpdbReader`]. IPv4 prefixes are grafted in under
//! the IPv4-mapped-IPv6 position so the reader's fixed descent finds
//! them where a production database would put them.

use ipnet::IpNet;
use std::collections::HashMap;

use super::format::*;
use crate::metadata::{Metadata, IP_VERSION_V4, IP_VERSION_V6};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Node(u32),
    Leaf(u32),
}

/// In-memory trie builder that serializes to the IPDB byte layout.
pub struct IpdbWriter {
    build: i64,
    fields: Vec<String>,
    ip_version_override: Option<u16>,
    nodes: Vec<[Slot; 2]>,
    payloads: Vec<Vec<u8>>,
    payload_index: HashMap<Vec<u8>, u32>,
    has_v4: bool,
    has_v6: bool,
}

impl IpdbWriter {
    /// Create a writer emitting the given label columns.
    pub fn new(fields: &[&str]) -> Self {
        Self {
            build: 0,
            fields: fields.iter().map(|s| s.to_string()).collect(),
            ip_version_override: None,
            nodes: Vec::new(),
            payloads: Vec::new(),
            payload_index: HashMap::new(),
            has_v4: false,
            has_v6: false,
        }
    }

    /// Set the build timestamp recorded in the descriptor.
    pub fn build_time(mut self, build: i64) -> Self {
        self.build = build;
        self
    }

    /// Force the `ip_version` bitmask instead of deriving it from the
    /// entries that were added.
    pub fn ip_version(mut self, mask: u16) -> Self {
        self.ip_version_override = Some(mask);
        self
    }

    /// Add a prefix with its label row.
    ///
    /// Entries must not overlap; a shorter prefix covering an existing
    /// one (or the reverse) is rejected.
    pub fn add(&mut self, cidr: &str, labels: &[&str]) -> Result<()> {
        let net: IpNet = cidr
            .parse()
            .map_err(|_| Error::InvalidCidr(cidr.to_string()))?;

        let payload_id = self.intern_payload(labels);

        match net {
            IpNet::V4(v4) => {
                let mut bits = Vec::with_capacity(V4_MAPPED_DEPTH as usize + 32);
                bits.extend(std::iter::repeat(0u8).take(V4_MAPPED_ZERO_LEVELS as usize));
                bits.extend(
                    std::iter::repeat(1u8)
                        .take((V4_MAPPED_DEPTH - V4_MAPPED_ZERO_LEVELS) as usize),
                );
                let addr = u32::from(v4.network());
                for i in 0..v4.prefix_len() {
                    bits.push(((addr >> (31 - i)) & 1) as u8);
                }
                self.insert(&bits, payload_id, cidr)?;
                self.has_v4 = true;
            }
            IpNet::V6(v6) => {
                if v6.prefix_len() == 0 {
                    // A /0 leaf has no edge to hang on; store it as the
                    // two half-space leaves, which aggregate back.
                    self.insert(&[0], payload_id, cidr)?;
                    self.insert(&[1], payload_id, cidr)?;
                } else {
                    let addr = u128::from(v6.network());
                    let mut bits = Vec::with_capacity(v6.prefix_len() as usize);
                    for i in 0..v6.prefix_len() {
                        bits.push(((addr >> (127 - i)) & 1) as u8);
                    }
                    self.insert(&bits, payload_id, cidr)?;
                }
                self.has_v6 = true;
            }
        }

        Ok(())
    }

    fn intern_payload(&mut self, labels: &[&str]) -> u32 {
        let payload = labels.join("\t").into_bytes();
        if let Some(&id) = self.payload_index.get(&payload) {
            return id;
        }
        let id = self.payloads.len() as u32;
        self.payload_index.insert(payload.clone(), id);
        self.payloads.push(payload);
        id
    }

    fn insert(&mut self, bits: &[u8], payload_id: u32, cidr: &str) -> Result<()> {
        if self.nodes.is_empty() {
            self.nodes.push([Slot::Empty; 2]);
        }

        let mut node = 0usize;
        for (i, &bit) in bits.iter().enumerate() {
            let last = i == bits.len() - 1;
            let slot = self.nodes[node][bit as usize];
            match slot {
                Slot::Leaf(_) => {
                    return Err(Error::OverlappingPrefix(cidr.to_string()));
                }
                Slot::Node(_) if last => {
                    return Err(Error::OverlappingPrefix(cidr.to_string()));
                }
                Slot::Node(next) => {
                    node = next as usize;
                }
                Slot::Empty if last => {
                    self.nodes[node][bit as usize] = Slot::Leaf(payload_id);
                }
                Slot::Empty => {
                    let next = self.nodes.len() as u32;
                    self.nodes.push([Slot::Empty; 2]);
                    self.nodes[node][bit as usize] = Slot::Node(next);
                    node = next as usize;
                }
            }
        }

        Ok(())
    }

    /// Serialize the database image.
    pub fn finish(&self) -> Result<Vec<u8>> {
        let node_count = self.nodes.len() as u32;

        // Leaf region: two pad bytes first, so no pointer can collide
        // with the absent sentinel value `node_count`.
        let mut region_offsets = Vec::with_capacity(self.payloads.len());
        let mut region = Vec::new();
        if !self.payloads.is_empty() {
            region.extend_from_slice(&[0, 0]);
            for payload in &self.payloads {
                region_offsets.push(region.len() as u32);
                region.extend_from_slice(&(payload.len() as u16).to_be_bytes());
                region.extend_from_slice(payload);
            }
        }

        let mut body = Vec::with_capacity(self.nodes.len() * NODE_SIZE + region.len());
        for node in &self.nodes {
            for slot in node {
                let ptr = match *slot {
                    Slot::Empty => 0,
                    Slot::Node(i) => i,
                    Slot::Leaf(pid) => node_count + region_offsets[pid as usize],
                };
                body.extend_from_slice(&ptr.to_be_bytes());
            }
        }
        body.extend_from_slice(&region);

        let ip_version = self.ip_version_override.unwrap_or_else(|| {
            u16::from(self.has_v4) * IP_VERSION_V4 | u16::from(self.has_v6) * IP_VERSION_V6
        });

        let meta = Metadata {
            build: self.build,
            ip_version,
            node_count,
            total_size: body.len() as u64,
            fields: self.fields.clone(),
            languages: HashMap::from([("CN".to_string(), 0)]),
        };
        let descriptor = serde_json::to_vec(&meta)?;

        let mut out =
            Vec::with_capacity(DESCRIPTOR_LEN_PREFIX + descriptor.len() + body.len());
        out.extend_from_slice(&(descriptor.len() as u32).to_be_bytes());
        out.extend_from_slice(&descriptor);
        out.extend_from_slice(&body);
        Ok(out)
    }
}
