//! Error types for the geolookup library
//!
//! Client-facing errors ([`LookupError`]) are the only failures `resolve`
//! returns. Database-layer problems never escape the service: they are
//! recorded as a [`FallbackReason`] next to the fallback value.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use crate::mmdb::MmdbError;
pub use crate::reader::ReaderError;

/// Malformed lookup request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The lookup type is not configured
    #[error("Unsupported lookup type '{requested}'. Supported types: {}", supported.join(", "))]
    InvalidLookupType {
        /// What the client asked for
        requested: String,
        /// Configured lookup types, in configuration order
        supported: Vec<String>,
    },
    /// The IP argument is empty or whitespace
    #[error("IP address cannot be empty")]
    InvalidInput,
}

impl LookupError {
    /// Name of the request parameter at fault
    pub fn parameter(&self) -> &'static str {
        match self {
            LookupError::InvalidLookupType { .. } => "lookup",
            LookupError::InvalidInput => "ip",
        }
    }
}

/// Why a lookup answered with the fallback value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No reader is loaded for the lookup type
    #[error("database unavailable")]
    DatabaseUnavailable,
    /// The IP text does not parse as an address
    #[error("invalid IP address")]
    InvalidAddress,
    /// The address has no record in the database
    #[error("address not found")]
    AddressNotFound,
    /// The record has no value at the attribute path
    #[error("attribute path absent")]
    PathAbsent,
    /// The search tree or record is corrupt
    #[error("database read error")]
    ReaderFault,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
    /// Config file is not valid JSON for [`ServiceConfig`](crate::ServiceConfig)
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// Attribute path is empty or has an empty segment
    #[error("Invalid attribute path '{path}': {reason}")]
    InvalidAttributePath {
        /// The offending path
        path: String,
        /// What is wrong with it
        reason: &'static str,
    },
    /// Two databases share a lookup type
    #[error("Duplicate lookup type '{0}'")]
    DuplicateLookupType(String),
    /// Any other invalid setting
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Setting name
        name: String,
        /// What is wrong with it
        reason: String,
    },
}
