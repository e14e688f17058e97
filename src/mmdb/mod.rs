//! MaxMind DB (MMDB) Reader internals
//!
//! The MMDB format uses a binary search tree for IP address lookups. Data
//! is stored in the MMDB data section format, decoded by
//! `crate::data_section::DataDecoder`.
//!
//! ## Architecture
//!
//! - **types**: MMDB-specific types and constants
//! - **format**: Metadata location and header extraction
//! - **tree**: Search tree traversal for IP lookups

pub mod format;
pub mod tree;
pub mod types;

pub use format::{find_metadata_marker, Metadata, MmdbHeader};
pub use tree::{LookupResult, SearchTree};
pub use types::{IpVersion, MmdbError, RecordSize, METADATA_MARKER};
