//! IPDB descriptor metadata.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// IPv4 bit in the `ip_version` bitmask.
pub const IP_VERSION_V4: u16 = 0x01;

/// IPv6 bit in the `ip_version` bitmask.
pub const IP_VERSION_V6: u16 = 0x02;

/// Parsed JSON descriptor that prefixes the trie body.
///
/// The on-disk layout is a 4-byte big-endian length followed by this
/// structure serialized as JSON, followed immediately by the node array.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metadata {
    /// Build timestamp (seconds since the Unix epoch)
    pub build: i64,
    /// Bitmask of enabled address families
    pub ip_version: u16,
    /// Number of internal trie nodes
    pub node_count: u32,
    /// Total byte size of the body (nodes plus leaf payloads)
    #[serde(default)]
    pub total_size: u64,
    /// Ordered label column names, one per tab-separated field
    pub fields: Vec<String>,
    /// Language name to field-group offset
    #[serde(default)]
    pub languages: HashMap<String, u32>,
}

impl Metadata {
    /// Whether the database carries an IPv4 trie.
    pub fn has_ipv4(&self) -> bool {
        self.ip_version & IP_VERSION_V4 != 0
    }

    /// Whether the database carries an IPv6 trie.
    pub fn has_ipv6(&self) -> bool {
        self.ip_version & IP_VERSION_V6 != 0
    }
}
