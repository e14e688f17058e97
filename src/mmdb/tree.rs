//! MMDB Search Tree Traversal
//!
//! Implements binary search tree traversal for IP address lookups.
//! The tree uses a compact binary representation where each node contains
//! two records (left and right) that point to either:
//! - Another node (continue traversal)
//! - A data section offset (found)
//! - A "not found" marker (record == node_count)

use super::format::MmdbHeader;
use super::types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR_SIZE};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Result of an IP lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    /// Offset into the data section (relative to data section start)
    pub data_offset: u32,
    /// Network prefix length, in the address family that was queried
    pub prefix_len: u8,
}

/// Search tree for IP address lookups
pub struct SearchTree<'a> {
    /// The raw file data containing the tree
    data: &'a [u8],
    /// Parsed header information
    header: &'a MmdbHeader,
}

impl<'a> SearchTree<'a> {
    /// Create a new search tree
    pub fn new(data: &'a [u8], header: &'a MmdbHeader) -> Self {
        Self { data, header }
    }

    /// Find where IPv4 lookups start
    ///
    /// IPv4 addresses in IPv6 trees live under ::/96, so the start is the
    /// record reached by following 96 zero bits. The returned value is a
    /// raw record: a node index, or a terminal (empty/data) record if the
    /// walk ended early. Callers compute this once per open database.
    pub fn ipv4_start(&self) -> Result<u32, MmdbError> {
        if self.header.ip_version == IpVersion::V4 {
            return Ok(0);
        }

        let mut record = 0u32;
        for _ in 0..96 {
            if record >= self.header.node_count {
                break;
            }
            record = self.read_record(record as usize, 0)?;
        }
        Ok(record)
    }

    /// Look up an IPv4 address starting from a precomputed IPv4 start record
    pub fn lookup_v4(
        &self,
        addr: Ipv4Addr,
        ipv4_start: u32,
    ) -> Result<Option<LookupResult>, MmdbError> {
        self.walk(ipv4_start, u32::from(addr) as u128, 32)
    }

    /// Look up an IPv6 address
    ///
    /// Only meaningful for IPv6 trees; IPv4 trees index 32 bits.
    pub fn lookup_v6(&self, addr: Ipv6Addr) -> Result<Option<LookupResult>, MmdbError> {
        if self.header.ip_version == IpVersion::V4 {
            return Err(MmdbError::InvalidFormat(
                "IPv6 lookup in an IPv4-only search tree".to_string(),
            ));
        }
        self.walk(0, u128::from(addr), 128)
    }

    /// Walk the tree from `start` following the top `bit_count` bits of `bits`
    /// (right-aligned).
    fn walk(
        &self,
        start: u32,
        bits: u128,
        bit_count: u8,
    ) -> Result<Option<LookupResult>, MmdbError> {
        let node_count = self.header.node_count;
        let mut record = start;
        let mut depth = 0u8;

        while record < node_count {
            if depth == bit_count {
                // Address exhausted while still inside the tree
                return Ok(None);
            }
            let bit = ((bits >> (bit_count - 1 - depth)) & 1) as u8;
            record = self.read_record(record as usize, bit)?;
            depth += 1;
        }

        if record == node_count {
            return Ok(None);
        }

        Ok(Some(LookupResult {
            data_offset: self.calculate_data_offset(record)?,
            prefix_len: depth,
        }))
    }

    /// Read a record from a node
    ///
    /// Each node contains two records. `side` determines which:
    /// - 0 = left record (for IP bit 0)
    /// - 1 = right record (for IP bit 1)
    fn read_record(&self, node: usize, side: u8) -> Result<u32, MmdbError> {
        if node as u32 >= self.header.node_count {
            return Err(MmdbError::InvalidFormat(format!(
                "Node index {} exceeds node count {}",
                node, self.header.node_count
            )));
        }

        match self.header.record_size {
            RecordSize::Bits24 => self.read_24bit_record(node, side),
            RecordSize::Bits28 => self.read_28bit_record(node, side),
            RecordSize::Bits32 => self.read_32bit_record(node, side),
        }
    }

    /// Bounds-checked slice of the tree
    fn tree_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], MmdbError> {
        if offset + len > self.header.tree_size {
            return Err(MmdbError::InvalidFormat(format!(
                "Record offset {} exceeds tree size {}",
                offset, self.header.tree_size
            )));
        }
        self.data.get(offset..offset + len).ok_or_else(|| {
            MmdbError::InvalidFormat(format!("Record offset {} beyond end of file", offset))
        })
    }

    /// Read a 24-bit record (3 bytes per record, 6 bytes per node)
    fn read_24bit_record(&self, node: usize, side: u8) -> Result<u32, MmdbError> {
        let b = self.tree_bytes(node * 6 + side as usize * 3, 3)?;
        Ok((b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32)
    }

    /// Read a 28-bit record (3.5 bytes per record, 7 bytes per node)
    ///
    /// Layout: [Left 24 bits][Middle 8 bits][Right 24 bits]
    /// Middle byte contains 4 high bits of left + 4 high bits of right
    fn read_28bit_record(&self, node: usize, side: u8) -> Result<u32, MmdbError> {
        let bytes = self.tree_bytes(node * 7, 7)?;

        if side == 0 {
            let high_bits = ((bytes[3] >> 4) & 0x0F) as u32;
            let low_bits = (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32;
            Ok((high_bits << 24) | low_bits)
        } else {
            let high_bits = (bytes[3] & 0x0F) as u32;
            let low_bits = (bytes[4] as u32) << 16 | (bytes[5] as u32) << 8 | bytes[6] as u32;
            Ok((high_bits << 24) | low_bits)
        }
    }

    /// Read a 32-bit record (4 bytes per record, 8 bytes per node)
    fn read_32bit_record(&self, node: usize, side: u8) -> Result<u32, MmdbError> {
        let b = self.tree_bytes(node * 8 + side as usize * 4, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Calculate data section offset from record value
    ///
    /// Record values above node_count point into the data section:
    /// `data_offset = (record - node_count) - 16`, the 16 being the
    /// separator between tree and data.
    fn calculate_data_offset(&self, record: u32) -> Result<u32, MmdbError> {
        record
            .checked_sub(self.header.node_count)
            .and_then(|r| r.checked_sub(DATA_SECTION_SEPARATOR_SIZE as u32))
            .ok_or_else(|| {
                MmdbError::InvalidFormat(format!(
                    "Record {} is not a valid data pointer (node_count = {})",
                    record, self.header.node_count
                ))
            })
    }
}
