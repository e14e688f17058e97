//! Database registry
//!
//! Maps each lookup type to its configuration and, when the file opened,
//! a shared [`Reader`]. A registry is built once by [`Registry::load`] and
//! is read-only afterwards; the service publishes a fresh registry to
//! change what is loaded.

use crate::config::DatabaseConfig;
use crate::reader::Reader;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// No reader is loaded for a lookup type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("database for '{0}' is unavailable")]
pub struct Unavailable(pub String);

#[derive(Debug, Clone)]
struct Entry {
    config: DatabaseConfig,
    reader: Option<Arc<Reader>>,
    /// Why the last open failed
    error: Option<String>,
}

/// Load state of one lookup type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStatus {
    /// Lookup type
    pub lookup_type: String,
    /// Configured file
    pub file: PathBuf,
    /// The file currently exists on disk
    pub available: bool,
    /// A reader is loaded
    pub loaded: bool,
    /// Why loading failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lookup type to (config, reader) mapping
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Open every configured database
    ///
    /// Each distinct file is opened once and shared by all lookup types
    /// that name it. Failures are logged and leave the type unavailable;
    /// loading never aborts.
    pub fn load(configs: &[DatabaseConfig]) -> Self {
        let mut opened: HashMap<&Path, Result<Arc<Reader>, String>> = HashMap::new();
        let mut registry = Self::default();

        for config in configs {
            let outcome = opened
                .entry(config.file_path.as_path())
                .or_insert_with(|| {
                    Reader::open(&config.file_path)
                        .map(Arc::new)
                        .map_err(|e| e.to_string())
                })
                .clone();

            match &outcome {
                Ok(reader) => info!(
                    target: "geolookup::registry",
                    lookup_type = %config.lookup_type,
                    path = %config.file_path.display(),
                    nodes = reader.header().node_count,
                    "Loaded database"
                ),
                Err(error) => warn!(
                    target: "geolookup::registry",
                    lookup_type = %config.lookup_type,
                    path = %config.file_path.display(),
                    %error,
                    "Failed to load database, serving fallback"
                ),
            }

            let (reader, error) = match outcome {
                Ok(reader) => (Some(reader), None),
                Err(error) => (None, Some(error)),
            };
            registry.push(Entry {
                config: config.clone(),
                reader,
                error,
            });
        }

        registry
    }

    /// Registry with every type configured and nothing loaded
    pub fn unloaded(configs: &[DatabaseConfig]) -> Self {
        let mut registry = Self::default();
        for config in configs {
            registry.push(Entry {
                config: config.clone(),
                reader: None,
                error: None,
            });
        }
        registry
    }

    fn push(&mut self, entry: Entry) {
        self.index
            .insert(entry.config.lookup_type.clone(), self.entries.len());
        self.entries.push(entry);
    }

    fn entry(&self, lookup_type: &str) -> Option<&Entry> {
        self.index.get(lookup_type).map(|&i| &self.entries[i])
    }

    /// Reader for a lookup type
    pub fn get(&self, lookup_type: &str) -> Result<&Arc<Reader>, Unavailable> {
        self.entry(lookup_type)
            .and_then(|entry| entry.reader.as_ref())
            .ok_or_else(|| Unavailable(lookup_type.to_string()))
    }

    /// Config for a lookup type
    pub fn config(&self, lookup_type: &str) -> Option<&DatabaseConfig> {
        self.entry(lookup_type).map(|entry| &entry.config)
    }

    /// Configured lookup types, in configuration order
    pub fn lookup_types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.config.lookup_type.as_str())
    }

    /// True when a reader is loaded for `lookup_type`
    pub fn is_loaded(&self, lookup_type: &str) -> bool {
        self.get(lookup_type).is_ok()
    }

    /// Types with a loaded reader
    pub fn loaded_types(&self) -> Vec<String> {
        self.types_where(|entry| entry.reader.is_some())
    }

    /// Types without a reader
    pub fn failed_types(&self) -> Vec<String> {
        self.types_where(|entry| entry.reader.is_none())
    }

    fn types_where(&self, pred: impl Fn(&Entry) -> bool) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| pred(e))
            .map(|e| e.config.lookup_type.clone())
            .collect()
    }

    /// Copy of this registry with `reader` installed for every type that
    /// uses `path`
    pub fn with_reader(&self, path: &Path, reader: Arc<Reader>) -> Self {
        let mut next = self.clone();
        for entry in next
            .entries
            .iter_mut()
            .filter(|e| e.config.file_path == path)
        {
            entry.reader = Some(Arc::clone(&reader));
            entry.error = None;
        }
        next
    }

    /// Release every reader
    ///
    /// Mappings are dropped once no in-flight lookup holds them. Safe to
    /// call more than once.
    pub fn unload(&mut self) {
        for entry in &mut self.entries {
            entry.reader = None;
        }
    }

    /// Status of every lookup type, in configuration order
    pub fn describe(&self) -> Vec<DatabaseStatus> {
        self.entries
            .iter()
            .map(|entry| DatabaseStatus {
                lookup_type: entry.config.lookup_type.clone(),
                file: entry.config.file_path.clone(),
                available: entry.config.file_path.is_file(),
                loaded: entry.reader.is_some(),
                error: entry.error.clone(),
            })
            .collect()
    }

    /// Number of configured lookup types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is configured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
