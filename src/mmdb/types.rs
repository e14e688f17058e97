//! MMDB-specific Type Definitions
//!
//! Data values use the `DataValue` type from the `data_section` module.

use thiserror::Error;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Size of the zeroed separator between the search tree and the data section
pub const DATA_SECTION_SEPARATOR_SIZE: usize = 16;

/// MMDB-specific error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MmdbError {
    /// Invalid file format
    #[error("Invalid MMDB format: {0}")]
    InvalidFormat(String),
    /// Metadata not found
    #[error("MMDB metadata marker not found")]
    MetadataNotFound,
    /// Invalid metadata structure
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
    /// Data decoding error (wraps DataDecoder errors)
    #[error("Data decode error: {0}")]
    DecodeError(String),
}

/// IP version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// IPv4 only
    V4,
    /// IPv6 (may include IPv4 space under ::/96)
    V6,
}

impl IpVersion {
    /// Numeric version as stored in metadata
    pub fn as_u8(self) -> u8 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    /// Number of address bits the tree indexes
    pub fn bit_count(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Get the size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Record width in bits
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Create from bit size
    pub fn from_bits(bits: u64) -> Result<Self, MmdbError> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(MmdbError::InvalidFormat(format!(
                "Invalid record size: {} bits",
                bits
            ))),
        }
    }
}
