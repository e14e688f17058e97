//! Lookup service facade
//!
//! [`LookupService`] turns `(lookup type, IP text)` into one string. Only
//! malformed requests fail; every database-side problem answers with the
//! configured fallback value.
//!
//! The registry lives behind an [`ArcSwap`]: each request takes a snapshot
//! without locking, and [`reload`](LookupService::reload) or an on-demand
//! retry publishes a new registry while in-flight lookups finish on the old
//! one.

use crate::config::{validate_databases, DatabaseConfig, RetryPolicy, ServiceConfig};
use crate::error::{ConfigError, FallbackReason, LookupError};
use crate::reader::{Reader, ReaderError};
use crate::registry::{DatabaseStatus, Registry};
use crate::resolver;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Service name reported by [`LookupService::describe`]
pub const SERVICE_NAME: &str = "GeoIP Lookup Service";

/// How a resolution was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum Outcome {
    /// The attribute was read from the database
    Found,
    /// The fallback value was served
    Fallback(FallbackReason),
}

/// Answer to one lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Resolved or fallback value
    pub value: String,
    /// Where `value` came from
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Resolution {
    /// True when `value` came from the database
    pub fn is_found(&self) -> bool {
        self.outcome == Outcome::Found
    }
}

/// Status code and body for the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    /// 200 for any resolution, 400 for a malformed request
    pub status: u16,
    /// Resolved value, or the error message
    pub body: String,
}

/// Per-database entry of [`ServiceInfo`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    /// Configured file
    pub file: PathBuf,
    /// The file exists on disk
    pub available: bool,
    /// A reader is loaded
    pub loaded: bool,
}

impl From<DatabaseStatus> for DatabaseInfo {
    fn from(status: DatabaseStatus) -> Self {
        Self {
            file: status.file,
            available: status.available,
            loaded: status.loaded,
        }
    }
}

/// Introspection snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Configured lookup types, in configuration order
    pub supported_lookups: Vec<String>,
    /// Load state per lookup type
    pub databases: BTreeMap<String, DatabaseInfo>,
}

/// Result of [`LookupService::reload`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    /// Registry generation now serving requests
    pub generation: u64,
    /// Types with a loaded reader
    pub loaded: Vec<String>,
    /// Types serving fallbacks
    pub failed: Vec<String>,
}

/// The lookup engine
pub struct LookupService {
    configs: Vec<DatabaseConfig>,
    supported: Vec<String>,
    registry: ArcSwap<Registry>,
    generation: AtomicU64,
    retry: RetryPolicy,
    /// Last on-demand open attempt per lookup type
    last_retry: Mutex<HashMap<String, Instant>>,
    /// Serializes publishers of new registries
    publish: Mutex<()>,
    shut_down: AtomicBool,
}

impl LookupService {
    /// Build the service and load every configured database
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::with_databases(config.databases.clone(), config.retry)
    }

    /// Build from explicit database configs
    pub fn with_databases(
        configs: Vec<DatabaseConfig>,
        retry: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        validate_databases(&configs)?;

        let registry = Registry::load(&configs);
        info!(
            target: "geolookup::service",
            loaded = registry.loaded_types().len(),
            configured = registry.len(),
            "Lookup service ready"
        );

        Ok(Self {
            supported: configs.iter().map(|c| c.lookup_type.clone()).collect(),
            configs,
            registry: ArcSwap::from_pointee(registry),
            generation: AtomicU64::new(1),
            retry,
            last_retry: Mutex::new(HashMap::new()),
            publish: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Resolve `ip` for `lookup_type`
    ///
    /// Fails only for an unknown lookup type or an empty IP. Any other
    /// problem yields the type's fallback value.
    pub fn resolve(&self, lookup_type: &str, ip: &str) -> Result<Resolution, LookupError> {
        let config = self.config(lookup_type)?;
        let ip = ip.trim();
        if ip.is_empty() {
            return Err(LookupError::InvalidInput);
        }

        let resolution = match self.lookup_attribute(config, ip) {
            Ok(value) => Resolution {
                value,
                outcome: Outcome::Found,
            },
            Err(reason) => {
                debug!(
                    target: "geolookup::service",
                    lookup_type, ip, %reason, "Serving fallback"
                );
                Resolution {
                    value: config.fallback_value.clone(),
                    outcome: Outcome::Fallback(reason),
                }
            }
        };

        debug!(target: "geolookup::service", "{} | {} => {}", lookup_type, ip, resolution.value);
        Ok(resolution)
    }

    /// Resolve and keep only the value
    pub fn resolve_value(&self, lookup_type: &str, ip: &str) -> Result<String, LookupError> {
        self.resolve(lookup_type, ip).map(|r| r.value)
    }

    /// Resolve and map the result to an HTTP status and body
    pub fn query(&self, lookup_type: &str, ip: &str) -> QueryResponse {
        match self.resolve(lookup_type, ip) {
            Ok(resolution) => QueryResponse {
                status: 200,
                body: resolution.value,
            },
            Err(error) => QueryResponse {
                status: 400,
                body: error.to_string(),
            },
        }
    }

    fn config(&self, lookup_type: &str) -> Result<&DatabaseConfig, LookupError> {
        self.configs
            .iter()
            .find(|c| c.lookup_type == lookup_type)
            .ok_or_else(|| LookupError::InvalidLookupType {
                requested: lookup_type.to_string(),
                supported: self.supported.clone(),
            })
    }

    fn lookup_attribute(&self, config: &DatabaseConfig, ip: &str) -> Result<String, FallbackReason> {
        let loaded = self.registry.load().get(&config.lookup_type).ok().cloned();
        let reader = match loaded {
            Some(reader) => reader,
            None => self
                .retry_open(config)
                .ok_or(FallbackReason::DatabaseUnavailable)?,
        };

        let record = match reader.lookup_str(ip) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(FallbackReason::AddressNotFound),
            Err(ReaderError::InvalidIpAddress(_)) => return Err(FallbackReason::InvalidAddress),
            Err(error) => {
                warn!(
                    target: "geolookup::service",
                    lookup_type = %config.lookup_type,
                    ip,
                    %error,
                    "Database read failed"
                );
                return Err(FallbackReason::ReaderFault);
            }
        };

        resolver::resolve(&record.data, &config.attribute_path)
            .map_err(|_| FallbackReason::PathAbsent)
    }

    /// Try opening a database that failed to load, if the retry policy
    /// allows another attempt now
    fn retry_open(&self, config: &DatabaseConfig) -> Option<Arc<Reader>> {
        let min_interval = self.retry.min_interval()?;
        if self.shut_down.load(Ordering::Acquire) {
            return None;
        }

        {
            let now = Instant::now();
            let mut last = self.last_retry.lock();
            match last.get(&config.lookup_type) {
                Some(at) if now.duration_since(*at) < min_interval => return None,
                _ => {
                    last.insert(config.lookup_type.clone(), now);
                }
            }
        }

        let reader = match Reader::open(&config.file_path) {
            Ok(reader) => Arc::new(reader),
            Err(error) => {
                debug!(
                    target: "geolookup::service",
                    lookup_type = %config.lookup_type,
                    %error,
                    "Retry failed"
                );
                return None;
            }
        };

        let _guard = self.publish.lock();
        if self.shut_down.load(Ordering::Acquire) {
            return None;
        }
        let current = self.registry.load_full();
        if let Ok(existing) = current.get(&config.lookup_type) {
            // Another request or a reload got there first
            return Some(Arc::clone(existing));
        }
        self.registry
            .store(Arc::new(current.with_reader(&config.file_path, Arc::clone(&reader))));
        self.generation.fetch_add(1, Ordering::AcqRel);
        info!(
            target: "geolookup::service",
            lookup_type = %config.lookup_type,
            path = %config.file_path.display(),
            "Loaded database on retry"
        );
        Some(reader)
    }

    /// Re-open every database and swap the new registry in
    ///
    /// After [`shutdown`](Self::shutdown) this does nothing and reports every
    /// type as failed.
    pub fn reload(&self) -> ReloadReport {
        let _guard = self.publish.lock();
        if self.shut_down.load(Ordering::Acquire) {
            return ReloadReport {
                generation: self.generation(),
                loaded: Vec::new(),
                failed: self.supported.clone(),
            };
        }

        let registry = Registry::load(&self.configs);
        let report = ReloadReport {
            generation: self.generation.fetch_add(1, Ordering::AcqRel) + 1,
            loaded: registry.loaded_types(),
            failed: registry.failed_types(),
        };
        self.registry.store(Arc::new(registry));
        self.last_retry.lock().clear();

        info!(
            target: "geolookup::service",
            generation = report.generation,
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Reloaded databases"
        );
        report
    }

    /// Release every reader; later lookups serve fallbacks
    pub fn shutdown(&self) {
        let _guard = self.publish.lock();
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut registry = Registry::clone(&self.registry.load());
        registry.unload();
        self.registry.store(Arc::new(registry));
        info!(target: "geolookup::service", "Lookup service shut down");
    }

    /// True from construction until shutdown
    pub fn is_ready(&self) -> bool {
        !self.shut_down.load(Ordering::Acquire)
    }

    /// Configured lookup types, in configuration order
    pub fn supported_lookups(&self) -> &[String] {
        &self.supported
    }

    /// Database configs, in configuration order
    pub fn databases(&self) -> &[DatabaseConfig] {
        &self.configs
    }

    /// Current registry snapshot
    pub fn snapshot(&self) -> Arc<Registry> {
        self.registry.load_full()
    }

    /// Number of registries published so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Service name, version and per-database status
    pub fn describe(&self) -> ServiceInfo {
        ServiceInfo {
            service: SERVICE_NAME.to_string(),
            version: crate::VERSION.to_string(),
            supported_lookups: self.supported.clone(),
            databases: self
                .registry
                .load()
                .describe()
                .into_iter()
                .map(|status| (status.lookup_type.clone(), DatabaseInfo::from(status)))
                .collect(),
        }
    }
}
