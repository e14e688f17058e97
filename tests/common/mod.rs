//! Test-only MaxMind DB writer
//!
//! Builds small but format-complete `.mmdb` files: a binary trie with
//! 24/28/32-bit records, a data section with pointer-compressed map keys,
//! and a metadata map. IPv4 networks inserted into an IPv6 tree land under
//! `::/96`, the way MaxMind's own writer places them.

#![allow(dead_code)]

use geolookup::DataValue;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Empty,
    Node(usize),
    Data(usize),
}

/// In-memory database under construction
pub struct MmdbWriter {
    ip_version: u16,
    record_size: u16,
    database_type: String,
    nodes: Vec<[Slot; 2]>,
    values: Vec<DataValue>,
}

impl MmdbWriter {
    /// Empty IPv4 (4) or IPv6 (6) database with 24-bit records
    pub fn new(ip_version: u16) -> Self {
        assert!(ip_version == 4 || ip_version == 6);
        Self {
            ip_version,
            record_size: 24,
            database_type: "GeoLookup-Test".to_string(),
            nodes: vec![[Slot::Empty, Slot::Empty]],
            values: Vec::new(),
        }
    }

    pub fn record_size(mut self, bits: u16) -> Self {
        assert!(matches!(bits, 24 | 28 | 32));
        self.record_size = bits;
        self
    }

    pub fn database_type(mut self, name: &str) -> Self {
        self.database_type = name.to_string();
        self
    }

    /// Map `cidr` (e.g. `8.8.8.0/24`) to `value`
    pub fn insert(&mut self, cidr: &str, value: DataValue) -> &mut Self {
        let (addr, prefix) = cidr.split_once('/').expect("cidr needs a prefix length");
        let addr: IpAddr = addr.parse().expect("valid network address");
        let prefix: u32 = prefix.parse().expect("valid prefix length");

        let (bits, bit_count, prefix) = match (addr, self.ip_version) {
            (IpAddr::V4(v4), 4) => (u32::from(v4) as u128, 32, prefix),
            (IpAddr::V4(v4), _) => (u32::from(v4) as u128, 128, prefix + 96),
            (IpAddr::V6(v6), 6) => (u128::from(v6), 128, prefix),
            (IpAddr::V6(_), _) => panic!("IPv6 network in an IPv4 database"),
        };
        assert!(prefix >= 1 && prefix <= bit_count);

        self.values.push(value);
        let data = Slot::Data(self.values.len() - 1);

        let mut node = 0;
        for depth in 0..prefix {
            let bit = ((bits >> (bit_count - 1 - depth)) & 1) as usize;
            if depth == prefix - 1 {
                self.nodes[node][bit] = data;
                break;
            }
            node = match self.nodes[node][bit] {
                Slot::Node(next) => next,
                terminal => {
                    // Split: the new node inherits whatever was here on both sides
                    self.nodes.push([terminal, terminal]);
                    let next = self.nodes.len() - 1;
                    self.nodes[node][bit] = Slot::Node(next);
                    next
                }
            };
        }
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Serialize the whole file
    pub fn build(&self) -> Vec<u8> {
        let mut data_section = Encoder::default();
        let offsets: Vec<usize> = self
            .values
            .iter()
            .map(|value| data_section.write(value))
            .collect();

        let node_count = self.nodes.len();
        let record = |slot: Slot| -> u32 {
            match slot {
                Slot::Empty => node_count as u32,
                Slot::Node(n) => n as u32,
                Slot::Data(i) => (node_count + 16 + offsets[i]) as u32,
            }
        };

        let mut out = Vec::new();
        for [left, right] in &self.nodes {
            write_node(&mut out, self.record_size, record(*left), record(*right));
        }
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&data_section.buf);
        out.extend_from_slice(METADATA_MARKER);
        out.extend_from_slice(&self.metadata(node_count));
        out
    }

    /// Write the file to `path`
    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).expect("write fixture database");
    }

    fn metadata(&self, node_count: usize) -> Vec<u8> {
        let metadata = map(vec![
            ("node_count", DataValue::Uint32(node_count as u32)),
            ("record_size", DataValue::Uint16(self.record_size)),
            ("ip_version", DataValue::Uint16(self.ip_version)),
            ("binary_format_major_version", DataValue::Uint16(2)),
            ("binary_format_minor_version", DataValue::Uint16(0)),
            ("build_epoch", DataValue::Uint64(1_700_000_000)),
            ("database_type", string(&self.database_type)),
            ("languages", DataValue::Array(vec![string("en")])),
            ("description", map(vec![("en", string("geolookup test fixture"))])),
        ]);
        let mut encoder = Encoder::default();
        encoder.write(&metadata);
        encoder.buf
    }
}

fn write_node(out: &mut Vec<u8>, record_size: u16, left: u32, right: u32) {
    match record_size {
        24 => {
            out.extend_from_slice(&left.to_be_bytes()[1..]);
            out.extend_from_slice(&right.to_be_bytes()[1..]);
        }
        28 => {
            out.extend_from_slice(&left.to_be_bytes()[1..]);
            out.push((((left >> 24) & 0x0F) << 4) as u8 | ((right >> 24) & 0x0F) as u8);
            out.extend_from_slice(&right.to_be_bytes()[1..]);
        }
        _ => {
            out.extend_from_slice(&left.to_be_bytes());
            out.extend_from_slice(&right.to_be_bytes());
        }
    }
}

/// Data section encoder; repeated map keys are written once and then
/// referenced by pointer
#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
    keys: HashMap<String, usize>,
}

impl Encoder {
    /// Append `value`, returning its offset
    fn write(&mut self, value: &DataValue) -> usize {
        let offset = self.buf.len();
        self.encode(value);
        offset
    }

    fn encode(&mut self, value: &DataValue) {
        match value {
            DataValue::String(s) => {
                self.control(2, s.len());
                self.buf.extend_from_slice(s.as_bytes());
            }
            DataValue::Double(d) => {
                self.control(3, 8);
                self.buf.extend_from_slice(&d.to_be_bytes());
            }
            DataValue::Bytes(b) => {
                self.control(4, b.len());
                self.buf.extend_from_slice(b);
            }
            DataValue::Uint16(n) => self.uint(5, *n as u128),
            DataValue::Uint32(n) => self.uint(6, *n as u128),
            DataValue::Map(entries) => {
                self.control(7, entries.len());
                let mut keys: Vec<_> = entries.keys().collect();
                keys.sort();
                for key in keys {
                    self.key(key);
                    self.encode(&entries[key]);
                }
            }
            DataValue::Int32(n) => {
                if *n < 0 {
                    self.control(8, 4);
                    self.buf.extend_from_slice(&n.to_be_bytes());
                } else {
                    self.uint(8, *n as u128);
                }
            }
            DataValue::Uint64(n) => self.uint(9, *n as u128),
            DataValue::Uint128(n) => self.uint(10, *n),
            DataValue::Array(items) => {
                self.control(11, items.len());
                for item in items {
                    self.encode(item);
                }
            }
            DataValue::Bool(b) => self.control(14, *b as usize),
            DataValue::Float(f) => {
                self.control(15, 4);
                self.buf.extend_from_slice(&f.to_be_bytes());
            }
        }
    }

    fn key(&mut self, key: &str) {
        if let Some(&offset) = self.keys.get(key) {
            self.pointer(offset);
        } else {
            self.keys.insert(key.to_string(), self.buf.len());
            self.encode(&DataValue::String(key.to_string()));
        }
    }

    fn pointer(&mut self, offset: usize) {
        if offset < 2048 {
            self.buf.push(0x20 | (offset >> 8) as u8);
            self.buf.push(offset as u8);
        } else if offset < 526_336 {
            let v = offset - 2048;
            self.buf.push(0x20 | 0x08 | (v >> 16) as u8);
            self.buf.extend_from_slice(&(v as u32).to_be_bytes()[2..]);
        } else {
            self.buf.push(0x20 | 0x18);
            self.buf.extend_from_slice(&(offset as u32).to_be_bytes());
        }
    }

    fn uint(&mut self, type_id: u8, n: u128) {
        let bytes = n.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        self.control(type_id, bytes.len() - skip);
        self.buf.extend_from_slice(&bytes[skip..]);
    }

    fn control(&mut self, type_id: u8, size: usize) {
        let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
            (size as u8, Vec::new())
        } else if size < 285 {
            (29, vec![(size - 29) as u8])
        } else if size < 65_821 {
            (30, ((size - 285) as u16).to_be_bytes().to_vec())
        } else {
            (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
        };

        if type_id <= 7 {
            self.buf.push(type_id << 5 | size_bits);
        } else {
            self.buf.push(size_bits);
            self.buf.push(type_id - 7);
        }
        self.buf.extend_from_slice(&extra);
    }
}

pub fn string(s: &str) -> DataValue {
    DataValue::String(s.to_string())
}

pub fn map(entries: Vec<(&str, DataValue)>) -> DataValue {
    DataValue::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

/// GeoLite2-Country style record
pub fn country_record(iso_code: &str, name: &str, continent: &str) -> DataValue {
    map(vec![
        (
            "continent",
            map(vec![("code", string(continent))]),
        ),
        (
            "country",
            map(vec![
                ("iso_code", string(iso_code)),
                ("names", map(vec![("en", string(name))])),
            ]),
        ),
    ])
}

/// GeoLite2-City style record
pub fn city_record(city: &str) -> DataValue {
    map(vec![
        ("city", map(vec![("names", map(vec![("en", string(city))]))])),
        (
            "location",
            map(vec![
                ("latitude", DataValue::Double(37.751)),
                ("longitude", DataValue::Double(-97.822)),
            ]),
        ),
    ])
}

/// GeoLite2-ASN style record
pub fn asn_record(number: u32, organization: &str) -> DataValue {
    map(vec![
        ("autonomous_system_number", DataValue::Uint32(number)),
        ("autonomous_system_organization", string(organization)),
    ])
}

/// Country database: 8.8.8.0/24 US, 1.1.1.0/24 AU, 81.2.69.0/24 GB,
/// 2001:4860::/32 US
pub fn country_db(ip_version: u16) -> MmdbWriter {
    let mut writer = MmdbWriter::new(ip_version).database_type("GeoLite2-Country");
    writer
        .insert("8.8.8.0/24", country_record("US", "United States", "NA"))
        .insert("1.1.1.0/24", country_record("AU", "Australia", "OC"))
        .insert("81.2.69.0/24", country_record("GB", "United Kingdom", "EU"));
    if ip_version == 6 {
        writer.insert(
            "2001:4860::/32",
            country_record("US", "United States", "NA"),
        );
    }
    writer
}

/// City database: 8.8.8.0/24 Mountain View, 81.2.69.0/24 with no city
pub fn city_db() -> MmdbWriter {
    let mut writer = MmdbWriter::new(6).database_type("GeoLite2-City");
    writer
        .insert("8.8.8.0/24", city_record("Mountain View"))
        .insert(
            "81.2.69.0/24",
            map(vec![("country", map(vec![("iso_code", string("GB"))]))]),
        );
    writer
}

/// ASN database: 8.8.8.0/24 AS15169, 1.1.1.0/24 AS13335
pub fn asn_db() -> MmdbWriter {
    let mut writer = MmdbWriter::new(6).database_type("GeoLite2-ASN");
    writer
        .insert("8.8.8.0/24", asn_record(15169, "GOOGLE"))
        .insert("1.1.1.0/24", asn_record(13335, "CLOUDFLARENET"));
    writer
}

/// Directory holding country.mmdb, city.mmdb and asn.mmdb
pub struct Fixture {
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        country_db(6).write_to(&dir.path().join("country.mmdb"));
        city_db().write_to(&dir.path().join("city.mmdb"));
        asn_db().write_to(&dir.path().join("asn.mmdb"));
        Self { dir }
    }

    pub fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    /// Default MaxMind layout pointed at this directory
    pub fn service_config(&self) -> geolookup::ServiceConfig {
        let mut config = geolookup::ServiceConfig::default();
        for database in &mut config.databases {
            let file = database
                .file_path
                .file_name()
                .expect("preset paths have file names")
                .to_owned();
            database.file_path = self.dir.path().join(file);
        }
        config
    }
}
