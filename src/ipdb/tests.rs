//! Tests for the IPDB binary format.
//!
//! These exercise the complete write-read round trip: trie layout,
//! descriptor parsing, enumeration order, the IPv4-mapped skip, point
//! lookups and malformed-input handling.

use std::net::IpAddr;

use super::reader::IpdbReader;
use super::writer::IpdbWriter;
use crate::metadata::{IP_VERSION_V4, IP_VERSION_V6};
use crate::range::AddressFamily;
use crate::Error;

/// Helper to build a reader from writer entries.
fn write_and_read(entries: &[(&str, &[&str])]) -> IpdbReader {
    let mut writer = IpdbWriter::new(&["country_name", "region_name"]);
    for (cidr, labels) in entries {
        writer.add(cidr, labels).expect("failed to add entry");
    }
    let data = writer.finish().expect("failed to serialize database");
    IpdbReader::from_bytes(data).expect("failed to open database")
}

// ============================================================================
// Round-trip and ordering
// ============================================================================

#[test]
fn test_v4_round_trip_ascending() {
    let reader = write_and_read(&[
        ("1.0.1.0/24", &["China", "Hong Kong"]),
        ("8.0.0.0/8", &["USA"]),
        ("1.0.0.0/24", &["China", "Beijing"]),
    ]);

    let (v4, v6) = reader.enumerate().unwrap();
    assert!(v6.is_empty());
    assert_eq!(v4.len(), 3);

    // Ascending by first address regardless of insertion order
    assert_eq!(v4[0].first_addr(), "1.0.0.0".parse::<IpAddr>().unwrap());
    assert_eq!(v4[1].first_addr(), "1.0.1.0".parse::<IpAddr>().unwrap());
    assert_eq!(v4[2].first_addr(), "8.0.0.0".parse::<IpAddr>().unwrap());
    assert_eq!(v4[2].last_addr(), "8.255.255.255".parse::<IpAddr>().unwrap());

    assert_eq!(v4[0].labels, vec!["China", "Beijing"]);
    assert_eq!(v4[0].family, AddressFamily::V4);
}

#[test]
fn test_v6_round_trip() {
    let reader = write_and_read(&[
        ("2400:da00::/32", &["中国", "北京"]),
        ("2001:200::/32", &["日本"]),
    ]);

    let (v4, v6) = reader.enumerate().unwrap();
    assert!(v4.is_empty());
    assert_eq!(v6.len(), 2);
    assert_eq!(v6[0].first_addr(), "2001:200::".parse::<IpAddr>().unwrap());
    assert_eq!(v6[1].first_addr(), "2400:da00::".parse::<IpAddr>().unwrap());
    assert_eq!(v6[0].labels, vec!["日本"]);
}

#[test]
fn test_mixed_families_share_one_trie() {
    let reader = write_and_read(&[
        ("1.0.0.0/24", &["China", "Beijing"]),
        ("2400:da00::/32", &["中国", "北京"]),
    ]);

    assert!(reader.metadata().has_ipv4());
    assert!(reader.metadata().has_ipv6());

    let (v4, v6) = reader.enumerate().unwrap();
    assert_eq!(v4.len(), 1);
    assert_eq!(v6.len(), 1);
}

#[test]
fn test_ipv4_leaves_never_duplicated_as_ipv6() {
    // The IPv4 data sits at the mapped position inside the IPv6 trie;
    // the IPv6 walk must not surface it.
    let reader = write_and_read(&[
        ("1.0.0.0/24", &["China", "Beijing"]),
        ("2400:da00::/32", &["中国", "北京"]),
    ]);

    let (_, v6) = reader.enumerate().unwrap();
    assert_eq!(v6.len(), 1);
    assert_eq!(v6[0].labels, vec!["中国", "北京"]);
}

#[test]
fn test_leaf_exactly_at_mapped_prefix_skipped() {
    // A leaf whose whole IPv6 path is the 96-bit mapped prefix shows up
    // as the IPv4 full range, never in the IPv6 output.
    let mut writer = IpdbWriter::new(&["country_name"]);
    writer.add("::ffff:0:0/96", &["USA"]).unwrap();
    writer.add("2001:200::/32", &["日本"]).unwrap();
    let data = writer.ip_version(IP_VERSION_V4 | IP_VERSION_V6).finish().unwrap();
    let reader = IpdbReader::from_bytes(data).unwrap();

    let (v4, v6) = reader.enumerate().unwrap();
    assert_eq!(v6.len(), 1);
    assert_eq!(v6[0].labels, vec!["日本"]);

    // Through the IPv4 root the same leaf covers all of IPv4 space.
    assert_eq!(v4.len(), 1);
    assert_eq!(v4[0].first, 0);
    assert_eq!(v4[0].last, u32::MAX as u128);
}

#[test]
fn test_empty_database() {
    let writer = IpdbWriter::new(&["country_name"]);
    let data = writer.ip_version(0).finish().unwrap();
    let reader = IpdbReader::from_bytes(data).unwrap();

    assert_eq!(reader.metadata().node_count, 0);
    let (v4, v6) = reader.enumerate().unwrap();
    assert!(v4.is_empty());
    assert!(v6.is_empty());
}

#[test]
fn test_empty_label_row_survives() {
    // A zero-length payload is not an error; it decodes to a single
    // empty field and downstream classification treats it as Other.
    let reader = write_and_read(&[("8.0.0.0/8", &[""])]);
    let (v4, _) = reader.enumerate().unwrap();
    assert_eq!(v4.len(), 1);
    assert_eq!(v4[0].labels, vec![String::new()]);
}

#[test]
fn test_duplicate_labels_share_payload() {
    let mut writer = IpdbWriter::new(&["country_name"]);
    for i in 0..16 {
        writer.add(&format!("10.{i}.0.0/16"), &["USA"]).unwrap();
    }
    let data = writer.finish().unwrap();
    let reader = IpdbReader::from_bytes(data).unwrap();

    let (v4, _) = reader.enumerate().unwrap();
    assert_eq!(v4.len(), 16);
    assert!(v4.iter().all(|r| r.labels == vec!["USA"]));
}

// ============================================================================
// Point lookup
// ============================================================================

#[test]
fn test_lookup_v4() {
    let reader = write_and_read(&[
        ("1.0.0.0/24", &["China", "Beijing"]),
        ("8.0.0.0/8", &["USA"]),
    ]);

    let hit = reader.lookup("8.8.8.8".parse().unwrap()).unwrap();
    assert_eq!(hit, Some(vec!["USA".to_string()]));

    let hit = reader.lookup("1.0.0.255".parse().unwrap()).unwrap();
    assert_eq!(hit.unwrap()[1], "Beijing");

    let miss = reader.lookup("2.0.0.1".parse().unwrap()).unwrap();
    assert!(miss.is_none());

    // IPv6 not enabled in this database
    let miss = reader.lookup("2001:db8::1".parse().unwrap()).unwrap();
    assert!(miss.is_none());
}

#[test]
fn test_lookup_v6() {
    let reader = write_and_read(&[("2400:da00::/32", &["中国", "北京"])]);

    let hit = reader.lookup("2400:da00::1".parse().unwrap()).unwrap();
    assert_eq!(hit.unwrap()[0], "中国");

    let miss = reader.lookup("2400:da01::1".parse().unwrap()).unwrap();
    assert!(miss.is_none());
}

// ============================================================================
// Writer validation
// ============================================================================

#[test]
fn test_overlapping_prefix_rejected() {
    let mut writer = IpdbWriter::new(&["country_name"]);
    writer.add("10.0.0.0/8", &["USA"]).unwrap();

    // Longer prefix under an existing leaf
    assert!(matches!(
        writer.add("10.1.0.0/16", &["USA"]),
        Err(Error::OverlappingPrefix(_))
    ));

    // Shorter prefix covering an existing subtree
    writer.add("11.1.0.0/16", &["USA"]).unwrap();
    assert!(matches!(
        writer.add("11.0.0.0/8", &["USA"]),
        Err(Error::OverlappingPrefix(_))
    ));
}

#[test]
fn test_invalid_cidr_rejected() {
    let mut writer = IpdbWriter::new(&["country_name"]);
    assert!(matches!(
        writer.add("not-a-cidr", &["USA"]),
        Err(Error::InvalidCidr(_))
    ));
}

// ============================================================================
// Malformed databases
// ============================================================================

#[test]
fn test_truncated_length_prefix() {
    let err = IpdbReader::from_bytes(vec![0, 0]).unwrap_err();
    assert!(matches!(err, Error::MalformedHeader(_)));
}

#[test]
fn test_descriptor_length_out_of_bounds() {
    let mut data = vec![0xFF, 0xFF, 0xFF, 0xFF];
    data.extend_from_slice(b"{}");
    let err = IpdbReader::from_bytes(data).unwrap_err();
    assert!(matches!(err, Error::MalformedHeader(_)));
}

#[test]
fn test_undecodable_descriptor() {
    let garbage = b"not json at all";
    let mut data = (garbage.len() as u32).to_be_bytes().to_vec();
    data.extend_from_slice(garbage);
    let err = IpdbReader::from_bytes(data).unwrap_err();
    assert!(matches!(err, Error::Descriptor(_)));
}

#[test]
fn test_node_array_exceeds_file() {
    let desc = br#"{"build":0,"ip_version":1,"node_count":1000,"fields":["country_name"]}"#;
    let mut data = (desc.len() as u32).to_be_bytes().to_vec();
    data.extend_from_slice(desc);
    data.extend_from_slice(&[0u8; 16]);
    let err = IpdbReader::from_bytes(data).unwrap_err();
    assert!(matches!(err, Error::MalformedBody(_)));
}

#[test]
fn test_neither_family_enabled() {
    let desc = br#"{"build":0,"ip_version":0,"node_count":1,"fields":["country_name"]}"#;
    let mut data = (desc.len() as u32).to_be_bytes().to_vec();
    data.extend_from_slice(desc);
    data.extend_from_slice(&[0u8; 8]);
    let err = IpdbReader::from_bytes(data).unwrap_err();
    assert!(matches!(err, Error::UnknownAddressFamily));
}

#[test]
fn test_leaf_payload_overruns_body() {
    // One root node whose left child claims a leaf record past the end.
    let desc = br#"{"build":0,"ip_version":1,"node_count":1,"fields":["country_name"]}"#;
    let mut data = (desc.len() as u32).to_be_bytes().to_vec();
    data.extend_from_slice(desc);
    // Node 0: left pointer 500 (leaf, offset 499 + 8 into an 8-byte body)
    data.extend_from_slice(&500u32.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes());
    let reader = IpdbReader::from_bytes(data).unwrap();
    let err = reader.enumerate().unwrap_err();
    assert!(matches!(err, Error::MalformedBody(_)));
}

// ============================================================================
// Gzip transparency
// ============================================================================

#[test]
fn test_gzip_compressed_database() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut writer = IpdbWriter::new(&["country_name"]);
    writer.add("8.0.0.0/8", &["USA"]).unwrap();
    let plain = writer.finish().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&plain).unwrap();
    let compressed = encoder.finish().unwrap();

    let reader = IpdbReader::from_bytes(compressed).unwrap();
    let (v4, _) = reader.enumerate().unwrap();
    assert_eq!(v4.len(), 1);
    assert_eq!(v4[0].labels, vec!["USA"]);
}

#[test]
fn test_open_from_disk() {
    use std::io::Write;

    let mut writer = IpdbWriter::new(&["country_name"]);
    writer.add("8.0.0.0/8", &["USA"]).unwrap();
    let data = writer.finish().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.ipdb");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&data).unwrap();
    drop(file);

    let reader = IpdbReader::open(&path).unwrap();
    assert!(reader.metadata().has_ipv4());
    let (v4, _) = reader.enumerate().unwrap();
    assert_eq!(v4.len(), 1);
}
