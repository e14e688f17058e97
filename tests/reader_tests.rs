//! Reader tests against generated database files

mod common;

use common::{asn_db, country_db, country_record, map, string, MmdbWriter};
use geolookup::mmdb::IpVersion;
use geolookup::{DataValue, MmdbError, Reader, ReaderError};
use std::net::IpAddr;

fn iso_code(reader: &Reader, ip: &str) -> Option<String> {
    reader
        .lookup_str(ip)
        .unwrap()
        .and_then(|record| {
            record
                .data
                .get("country")
                .and_then(|c| c.get("iso_code"))
                .and_then(DataValue::as_str)
                .map(str::to_string)
        })
}

#[test]
fn test_ipv4_database() {
    let reader = Reader::from_bytes(country_db(4).build()).unwrap();
    assert_eq!(reader.header().ip_version, IpVersion::V4);

    assert_eq!(iso_code(&reader, "8.8.8.8").as_deref(), Some("US"));
    assert_eq!(iso_code(&reader, "8.8.8.255").as_deref(), Some("US"));
    assert_eq!(iso_code(&reader, "1.1.1.1").as_deref(), Some("AU"));
    assert_eq!(iso_code(&reader, "81.2.69.160").as_deref(), Some("GB"));
    assert_eq!(reader.lookup_str("8.8.9.1").unwrap(), None);
    assert_eq!(reader.lookup_str("198.51.100.1").unwrap(), None);
}

#[test]
fn test_ipv6_database_serves_both_families() {
    let reader = Reader::from_bytes(country_db(6).build()).unwrap();
    assert_eq!(reader.header().ip_version, IpVersion::V6);

    let record = reader.lookup_str("8.8.8.8").unwrap().unwrap();
    assert_eq!(record.prefix_len, 24);
    assert_eq!(iso_code(&reader, "2001:4860:4860::8888").as_deref(), Some("US"));
    assert_eq!(reader.lookup_str("2001:db8::1").unwrap(), None);
}

#[test]
fn test_ipv4_mapped_ipv6_matches_ipv4() {
    for ip_version in [4, 6] {
        let reader = Reader::from_bytes(country_db(ip_version).build()).unwrap();
        assert_eq!(
            reader.lookup_str("::ffff:8.8.8.8").unwrap(),
            reader.lookup_str("8.8.8.8").unwrap(),
        );
        assert_eq!(iso_code(&reader, "::ffff:1.1.1.1").as_deref(), Some("AU"));
    }
}

#[test]
fn test_ipv6_query_against_ipv4_database_is_not_found() {
    let reader = Reader::from_bytes(country_db(4).build()).unwrap();
    assert_eq!(reader.lookup_str("2001:4860:4860::8888").unwrap(), None);
}

#[test]
fn test_all_record_sizes() {
    for bits in [24, 28, 32] {
        for ip_version in [4, 6] {
            let bytes = country_db(ip_version).record_size(bits).build();
            let reader = Reader::from_bytes(bytes).unwrap();
            assert_eq!(reader.header().record_size.bits(), bits);
            assert_eq!(
                iso_code(&reader, "81.2.69.142").as_deref(),
                Some("GB"),
                "record size {} in IPv{} tree",
                bits,
                ip_version
            );
            assert_eq!(reader.lookup_str("9.9.9.9").unwrap(), None);
        }
    }
}

#[test]
fn test_28_bit_records_across_many_nodes() {
    // Many nodes on both halves of the tree exercise the shared nibble byte
    let mut writer = MmdbWriter::new(6).record_size(28);
    for i in 0..64u8 {
        writer.insert(
            &format!("10.{}.0.0/16", i),
            map(vec![("n", DataValue::Uint16(i as u16))]),
        );
        writer.insert(
            &format!("2001:db8:{:x}::/48", i),
            map(vec![("n", DataValue::Uint16(1000 + i as u16))]),
        );
    }
    let reader = Reader::from_bytes(writer.build()).unwrap();

    let n = |ip: &str| {
        reader
            .lookup_str(ip)
            .unwrap()
            .and_then(|r| r.data.get("n").and_then(DataValue::as_u64))
    };
    assert_eq!(n("10.0.1.1"), Some(0));
    assert_eq!(n("10.63.200.1"), Some(63));
    assert_eq!(n("2001:db8:3f::1"), Some(1063));
    assert_eq!(n("10.64.0.1"), None);
}

#[test]
fn test_nested_and_typed_values() {
    let mut writer = MmdbWriter::new(4);
    writer.insert(
        "192.0.2.0/24",
        map(vec![
            ("asn", DataValue::Uint32(64496)),
            ("big", DataValue::Uint64(u64::MAX)),
            ("negative", DataValue::Int32(-7)),
            ("anycast", DataValue::Bool(true)),
            ("ratio", DataValue::Float(0.5)),
            ("tags", DataValue::Array(vec![string("a"), string("b")])),
            ("raw", DataValue::Bytes(vec![1, 2, 3])),
        ]),
    );
    let reader = Reader::from_bytes(writer.build()).unwrap();
    let record = reader.lookup_str("192.0.2.1").unwrap().unwrap().data;

    assert_eq!(record.get("asn"), Some(&DataValue::Uint32(64496)));
    assert_eq!(record.get("big"), Some(&DataValue::Uint64(u64::MAX)));
    assert_eq!(record.get("negative"), Some(&DataValue::Int32(-7)));
    assert_eq!(record.get("anycast"), Some(&DataValue::Bool(true)));
    assert_eq!(record.get("ratio"), Some(&DataValue::Float(0.5)));
    assert_eq!(
        record.get("tags"),
        Some(&DataValue::Array(vec![string("a"), string("b")]))
    );
    assert_eq!(record.get("raw"), Some(&DataValue::Bytes(vec![1, 2, 3])));
}

#[test]
fn test_shared_keys_are_decoded_through_pointers() {
    // Second and later records reuse keys via pointers
    let reader = Reader::from_bytes(asn_db().build()).unwrap();
    for (ip, org) in [("8.8.8.8", "GOOGLE"), ("1.1.1.1", "CLOUDFLARENET")] {
        let record = reader.lookup_str(ip).unwrap().unwrap().data;
        assert_eq!(
            record.get("autonomous_system_organization"),
            Some(&string(org))
        );
    }
}

#[test]
fn test_more_specific_network_inside_larger_one() {
    let mut writer = MmdbWriter::new(4);
    writer
        .insert("10.0.0.0/8", country_record("AA", "Outer", "EU"))
        .insert("10.1.0.0/16", country_record("BB", "Inner", "EU"));
    let reader = Reader::from_bytes(writer.build()).unwrap();

    assert_eq!(iso_code(&reader, "10.1.2.3").as_deref(), Some("BB"));
    assert_eq!(iso_code(&reader, "10.2.0.1").as_deref(), Some("AA"));
    assert_eq!(reader.lookup_str("10.1.2.3").unwrap().unwrap().prefix_len, 16);
    assert_eq!(reader.lookup_str("10.2.0.1").unwrap().unwrap().prefix_len, 8);
}

#[test]
fn test_metadata_round_trip() {
    let reader = Reader::from_bytes(country_db(6).build()).unwrap();
    let metadata = reader.metadata().unwrap();
    assert_eq!(metadata.database_type, "GeoLite2-Country");
    assert_eq!(metadata.binary_format_major_version, 2);
    assert_eq!(metadata.ip_version, 6);
    assert_eq!(metadata.record_size, 24);
    assert_eq!(metadata.languages, ["en"]);
    assert_eq!(metadata.build_epoch, 1_700_000_000);
    assert_eq!(metadata.description["en"], "geolookup test fixture");
    assert_eq!(metadata.node_count, reader.header().node_count);
}

#[test]
fn test_truncated_file_is_rejected() {
    let bytes = country_db(4).build();
    // Cut inside the search tree: the metadata marker is gone
    let err = Reader::from_bytes(bytes[..10].to_vec()).unwrap_err();
    assert!(matches!(err, ReaderError::Format(MmdbError::MetadataNotFound)));
}

#[test]
fn test_lookup_by_ip_addr() {
    let reader = Reader::from_bytes(country_db(6).build()).unwrap();
    let addr: IpAddr = "1.1.1.1".parse().unwrap();
    assert!(reader.lookup(addr).unwrap().is_some());
}
