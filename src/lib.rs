//! Geolookup - Low-latency GeoIP Lookups over MaxMind DB Files
//!
//! Geolookup resolves an IP address to one geographic or network-ownership
//! attribute (country, continent, city, AS number, AS name) by reading
//! MaxMind DB (`.mmdb`) files in place. It is the engine behind a small
//! lookup endpoint that reverse proxies and load balancers call per request.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use geolookup::{LookupService, ServiceConfig};
//!
//! // Default layout: country/continent/city/asn/asname under /tmp
//! let service = LookupService::new(&ServiceConfig::default())?;
//!
//! // Client errors are the only failures
//! let country = service.resolve_value("country", "8.8.8.8")?;
//! println!("8.8.8.8 => {}", country);
//!
//! // Unknown addresses, missing files and corrupt records serve the fallback
//! let resolution = service.resolve("country", "198.51.100.1")?;
//! println!("{} ({:?})", resolution.value, resolution.outcome);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! resolve(type, ip)
//!   │  validate type and IP          → LookupError (400)
//!   ▼
//! Registry snapshot (ArcSwap)        → fallback if not loaded
//!   ▼
//! Reader: search tree + data section → fallback if not found / corrupt
//!   ▼
//! Resolver: walk attribute path      → fallback if absent
//!   ▼
//! value
//! ```
//!
//! Readers memory-map their file once and decode only the tree nodes and
//! the single record each lookup touches. Registries are immutable
//! snapshots, so the request path takes no locks.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Configuration: database layout, presets, bind settings, retry policy
pub mod config;
/// Data section decoding for MaxMind DB records
pub mod data_section;
/// Error types
pub mod error;
/// MMDB format internals: metadata, header, search tree
pub mod mmdb;
pub mod reader;
pub mod registry;
pub mod resolver;
pub mod service;

pub use crate::config::{DatabaseConfig, Preset, RetryPolicy, ServiceConfig};
pub use crate::data_section::DataValue;
pub use crate::error::{ConfigError, FallbackReason, LookupError};
pub use crate::mmdb::{Metadata, MmdbError};
pub use crate::reader::{LookupRecord, Reader, ReaderError};
pub use crate::registry::{DatabaseStatus, Registry, Unavailable};
pub use crate::resolver::{AttributePath, PathAbsent};
pub use crate::service::{
    LookupService, Outcome, QueryResponse, ReloadReport, Resolution, ServiceInfo,
};

/// Crate version, reported by [`LookupService::describe`]
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
