//! MMDB Binary Format Parsing
//!
//! Handles the metadata block at the end of an MMDB file with minimal heap
//! allocation. Only the essential header fields are kept; the tree and data
//! section stay in the mapped file.
//!
//! Design:
//! - Find metadata marker (memmem search over the file tail, no allocation)
//! - Extract only: node_count, record_size, ip_version, tree/data boundaries
//! - Tree traversal works with pure offsets (zero allocation)
//! - Full metadata is decoded on demand

use super::types::{
    IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER,
};
use crate::data_section::{DataDecoder, DataValue};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// The only binary format major version this reader understands
pub const SUPPORTED_FORMAT_MAJOR: u64 = 2;

/// MMDB file header - minimal heap usage
///
/// Contains only the information needed for IP lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmdbHeader {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes
    pub tree_size: usize,
    /// Offset of the data section (tree size plus separator)
    pub data_section_start: usize,
    /// Offset of the metadata marker (end of the data section)
    pub metadata_start: usize,
}

impl MmdbHeader {
    /// Parse an MMDB file and extract minimal header information
    pub fn from_file(data: &[u8]) -> Result<Self, MmdbError> {
        let marker_offset = find_metadata_marker(data)?;
        let metadata_value = decode_metadata(data, marker_offset)?;

        let map = match metadata_value {
            DataValue::Map(ref map) => map,
            _ => {
                return Err(MmdbError::InvalidMetadata(
                    "Metadata is not a map".to_string(),
                ))
            }
        };

        let major = extract_uint(map, "binary_format_major_version")?;
        if major != SUPPORTED_FORMAT_MAJOR {
            return Err(MmdbError::InvalidMetadata(format!(
                "Unsupported binary format major version: {}",
                major
            )));
        }

        let node_count = extract_uint(map, "node_count")?;
        let node_count = u32::try_from(node_count).map_err(|_| {
            MmdbError::InvalidMetadata(format!("node_count {} out of range", node_count))
        })?;
        let record_size = RecordSize::from_bits(extract_uint(map, "record_size")?)?;

        let ip_version = match extract_uint(map, "ip_version")? {
            4 => IpVersion::V4,
            6 => IpVersion::V6,
            other => {
                return Err(MmdbError::InvalidMetadata(format!(
                    "Invalid IP version: {}",
                    other
                )))
            }
        };

        let tree_size = (node_count as usize) * record_size.node_bytes();
        let data_section_start = tree_size + DATA_SECTION_SEPARATOR_SIZE;
        if data_section_start > marker_offset {
            return Err(MmdbError::InvalidFormat(format!(
                "Search tree ({} bytes) overlaps metadata at offset {}",
                tree_size, marker_offset
            )));
        }

        Ok(MmdbHeader {
            node_count,
            record_size,
            ip_version,
            tree_size,
            data_section_start,
            metadata_start: marker_offset,
        })
    }
}

/// Decoded database metadata
///
/// Mirrors the metadata map every MMDB file carries. Optional fields are
/// left empty when the writer omitted them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    /// e.g. "GeoLite2-Country"
    pub database_type: String,
    /// Binary format major version (always 2)
    pub binary_format_major_version: u16,
    /// Binary format minor version
    pub binary_format_minor_version: u16,
    /// Build time as seconds since the Unix epoch
    pub build_epoch: u64,
    /// 4 or 6
    pub ip_version: u8,
    /// Number of search tree nodes
    pub node_count: u32,
    /// Record size in bits
    pub record_size: u16,
    /// Locale codes the records may contain names for
    pub languages: Vec<String>,
    /// Descriptions keyed by language
    pub description: BTreeMap<String, String>,
}

impl Metadata {
    /// Decode the metadata block of an MMDB file
    pub fn from_file(data: &[u8]) -> Result<Self, MmdbError> {
        let header = MmdbHeader::from_file(data)?;
        let value = decode_metadata(data, header.metadata_start)?;
        let map = match value {
            DataValue::Map(map) => map,
            _ => {
                return Err(MmdbError::InvalidMetadata(
                    "Metadata is not a map".to_string(),
                ))
            }
        };

        let database_type = match map.get("database_type") {
            Some(DataValue::String(s)) => s.clone(),
            Some(_) => {
                return Err(MmdbError::InvalidMetadata(
                    "Field 'database_type' is not a string".to_string(),
                ))
            }
            None => String::new(),
        };

        let languages = match map.get("languages") {
            Some(DataValue::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let description = match map.get("description") {
            Some(DataValue::Map(entries)) => entries
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        };

        Ok(Metadata {
            database_type,
            binary_format_major_version: SUPPORTED_FORMAT_MAJOR as u16,
            binary_format_minor_version: optional_uint(&map, "binary_format_minor_version")
                as u16,
            build_epoch: optional_uint(&map, "build_epoch"),
            ip_version: header.ip_version.as_u8(),
            node_count: header.node_count,
            record_size: header.record_size.bits(),
            languages,
            description,
        })
    }
}

/// Find the metadata marker in an MMDB file (zero allocation)
///
/// The marker appears somewhere in the last 128KB of the file and the
/// metadata comes right AFTER it. If there are several, the LAST one wins.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize, MmdbError> {
    const SEARCH_SIZE: usize = 128 * 1024;

    let search_start = data.len().saturating_sub(SEARCH_SIZE);
    memchr::memmem::rfind(&data[search_start..], METADATA_MARKER)
        .map(|pos| search_start + pos)
        .ok_or(MmdbError::MetadataNotFound)
}

fn decode_metadata(data: &[u8], marker_offset: usize) -> Result<DataValue, MmdbError> {
    let metadata_bytes = &data[marker_offset + METADATA_MARKER.len()..];
    DataDecoder::new(metadata_bytes, 0)
        .decode(0)
        .map_err(|e| MmdbError::InvalidMetadata(format!("Failed to decode metadata: {}", e)))
}

fn extract_uint(map: &HashMap<String, DataValue>, key: &str) -> Result<u64, MmdbError> {
    match map.get(key) {
        Some(value) => value.as_u64().ok_or_else(|| {
            MmdbError::InvalidMetadata(format!("Field '{}' is not an unsigned integer", key))
        }),
        None => Err(MmdbError::InvalidMetadata(format!(
            "Required field '{}' not found",
            key
        ))),
    }
}

fn optional_uint(map: &HashMap<String, DataValue>, key: &str) -> u64 {
    map.get(key).and_then(DataValue::as_u64).unwrap_or(0)
}
