//! Error types for nchnroutes.

use thiserror::Error;

/// Error type for nchnroutes operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database header length prefix or descriptor is unusable
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Descriptor bytes are not valid JSON
    #[error("malformed descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),

    /// Trie node or leaf reference points outside the body
    #[error("malformed trie body: {0}")]
    MalformedBody(String),

    /// ip_version bitmask enables neither IPv4 nor IPv6
    #[error("database enables neither address family")]
    UnknownAddressFamily,

    /// Prefix being written overlaps an existing entry
    #[error("prefix overlaps an existing entry: {0}")]
    OverlappingPrefix(String),

    /// CIDR string in a route file could not be parsed
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for nchnroutes operations.
pub type Result<T> = std::result::Result<T, Error>;
