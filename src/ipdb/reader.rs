//! IPDB reader: header parsing, trie enumeration and point lookup.

use flate2::read::GzDecoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::net::IpAddr;
use std::path::Path;

use super::format::*;
use crate::metadata::Metadata;
use crate::range::{addr_to_int, AddressFamily, IpRange};
use crate::{Error, Result};

/// Memory-mapped IPDB reader.
///
/// The whole database stays in one read-only buffer for its lifetime;
/// enumeration and lookups only ever borrow from it.
#[derive(Debug)]
pub struct IpdbReader {
    mmap: Mmap,
    meta: Metadata,
    /// Offset of the trie body (node array) within the buffer
    body_start: usize,
    /// Node index reached by the fixed 96-level descent, or a leaf
    /// pointer when the IPv4 space collapses into a single record
    v4_root: u32,
}

impl IpdbReader {
    /// Open a database file.
    ///
    /// Gzip-compressed files are decompressed transparently.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() >= 2 && mmap[..2] == GZIP_MAGIC {
            let mut decoded = Vec::new();
            GzDecoder::new(&mmap[..]).read_to_end(&mut decoded)?;
            return Self::from_bytes(decoded);
        }

        Self::parse(mmap)
    }

    /// Open a database from an in-memory image.
    ///
    /// This writes the data to a temp file and then memory-maps it, so
    /// the single-buffer ownership model holds for both entry points.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        use std::io::Write;

        let data = if data.len() >= 2 && data[..2] == GZIP_MAGIC {
            let mut decoded = Vec::new();
            GzDecoder::new(&data[..]).read_to_end(&mut decoded)?;
            decoded
        } else {
            data
        };

        let mut temp_file = tempfile::tempfile()?;
        temp_file.write_all(&data)?;

        let mmap = unsafe { Mmap::map(&temp_file)? };
        Self::parse(mmap)
    }

    fn parse(mmap: Mmap) -> Result<Self> {
        if mmap.len() < DESCRIPTOR_LEN_PREFIX {
            return Err(Error::MalformedHeader(format!(
                "file too short for length prefix: {} bytes",
                mmap.len()
            )));
        }

        let desc_len = u32::from_be_bytes([mmap[0], mmap[1], mmap[2], mmap[3]]) as usize;
        let body_start = DESCRIPTOR_LEN_PREFIX + desc_len;
        if desc_len == 0 || body_start > mmap.len() {
            return Err(Error::MalformedHeader(format!(
                "descriptor length {} exceeds file size {}",
                desc_len,
                mmap.len()
            )));
        }

        let meta: Metadata = serde_json::from_slice(&mmap[DESCRIPTOR_LEN_PREFIX..body_start])?;

        let node_area = meta.node_count as usize * NODE_SIZE;
        if body_start + node_area > mmap.len() {
            return Err(Error::MalformedBody(format!(
                "node array ({} nodes) exceeds file size",
                meta.node_count
            )));
        }

        if !meta.has_ipv4() && !meta.has_ipv6() && meta.node_count > 0 {
            return Err(Error::UnknownAddressFamily);
        }

        let mut reader = Self {
            mmap,
            meta,
            body_start,
            v4_root: 0,
        };
        reader.v4_root = reader.locate_v4_root();
        Ok(reader)
    }

    /// Database descriptor.
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn node_count(&self) -> usize {
        self.meta.node_count as usize
    }

    fn body(&self) -> &[u8] {
        &self.mmap[self.body_start..]
    }

    /// Child pointer `bit` of an internal node. The node array bounds
    /// were validated at parse time.
    fn read_node(&self, node: usize, bit: u32) -> u32 {
        let off = node * NODE_SIZE + bit as usize * 4;
        let body = self.body();
        u32::from_be_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]])
    }

    /// Fixed 96-level descent to the IPv4 subtree: child 0 for the first
    /// 80 levels, child 1 for the next 16.
    fn locate_v4_root(&self) -> u32 {
        let mut node = 0u32;
        for level in 0..V4_MAPPED_DEPTH {
            if node as usize >= self.node_count() {
                break;
            }
            let bit = u32::from(level >= V4_MAPPED_ZERO_LEVELS);
            node = self.read_node(node as usize, bit);
        }
        node
    }

    /// Resolve a leaf pointer to its owned label row.
    fn resolve_leaf(&self, ptr: u32) -> Result<Vec<String>> {
        let body = self.body();
        let offset = ptr as usize - self.node_count() + self.node_count() * NODE_SIZE;
        if offset + LEAF_LEN_PREFIX > body.len() {
            return Err(Error::MalformedBody(format!(
                "leaf pointer {ptr} points outside the body"
            )));
        }

        let size = u16::from_be_bytes([body[offset], body[offset + 1]]) as usize;
        let start = offset + LEAF_LEN_PREFIX;
        if start + size > body.len() {
            return Err(Error::MalformedBody(format!(
                "leaf payload at {offset} overruns the body"
            )));
        }

        let text = String::from_utf8_lossy(&body[start..start + size]);
        Ok(text.split('\t').map(str::to_owned).collect())
    }

    /// Enumerate every leaf of both enabled families, each family in
    /// strictly ascending first-address order.
    pub fn enumerate(&self) -> Result<(Vec<IpRange>, Vec<IpRange>)> {
        let mut v4 = Vec::new();
        let mut v6 = Vec::new();

        if self.meta.has_ipv4() {
            self.walk(self.v4_root, AddressFamily::V4, &mut v4)?;
        }
        if self.meta.has_ipv6() {
            self.walk(0, AddressFamily::V6, &mut v6)?;
        }

        Ok((v4, v6))
    }

    /// Iterative left-before-right depth-first walk from `root`.
    ///
    /// The stack holds `(node, depth, path)` with the path bits
    /// right-aligned in a u128, which keeps the IPv4-mapped skip a
    /// single shift-and-compare on the live path.
    fn walk(&self, root: u32, family: AddressFamily, out: &mut Vec<IpRange>) -> Result<()> {
        if self.node_count() == 0 && root == 0 {
            // No trie at all: nothing to enumerate for this family.
            return Ok(());
        }

        let width = family.width();
        let mut stack: Vec<(u32, u32, u128)> = vec![(root, 0, 0)];

        while let Some((node, depth, path)) = stack.pop() {
            // IPv4 data is enumerated only through the IPv4 root, never
            // duplicated into the IPv6 output.
            if family == AddressFamily::V6
                && depth >= V4_MAPPED_DEPTH
                && path >> (depth - V4_MAPPED_DEPTH) == V4_MAPPED_PATH
            {
                continue;
            }

            if node as usize > self.node_count() {
                let labels = self.resolve_leaf(node)?;
                let prefix = if depth == 0 { 0 } else { path << (width - depth) };
                out.push(IpRange::from_prefix(family, prefix, depth, labels));
                continue;
            }

            if node as usize == self.node_count() {
                continue;
            }

            if depth >= width {
                return Err(Error::MalformedBody(format!(
                    "trie path exceeds {width} bits"
                )));
            }

            let left = self.read_node(node as usize, 0);
            let right = self.read_node(node as usize, 1);

            // Right pushed first so the left subtree pops first.
            if right != 0 {
                stack.push((right, depth + 1, path << 1 | 1));
            }
            if left != 0 {
                stack.push((left, depth + 1, path << 1));
            }
        }

        Ok(())
    }

    /// Walk a single address down to its leaf and return the label row,
    /// or `None` when no leaf covers it.
    pub fn lookup(&self, addr: IpAddr) -> Result<Option<Vec<String>>> {
        let (value, family) = addr_to_int(addr);
        let width = family.width();

        let mut node = match family {
            AddressFamily::V4 => {
                if !self.meta.has_ipv4() {
                    return Ok(None);
                }
                self.v4_root
            }
            AddressFamily::V6 => {
                if !self.meta.has_ipv6() {
                    return Ok(None);
                }
                0
            }
        };

        if self.node_count() == 0 {
            return Ok(None);
        }

        for i in 0..width {
            if node as usize >= self.node_count() {
                break;
            }
            let bit = (value >> (width - 1 - i)) & 1;
            node = self.read_node(node as usize, bit as u32);
            if node == 0 || node as usize == self.node_count() {
                return Ok(None);
            }
        }

        if node as usize > self.node_count() {
            Ok(Some(self.resolve_leaf(node)?))
        } else {
            Ok(None)
        }
    }
}
