//! Service configuration
//!
//! A [`ServiceConfig`] lists the databases to serve plus the bind settings
//! the HTTP layer reads. It comes from a [`Preset`], optionally replaced by
//! a JSON file and then adjusted by environment variables.
//!
//! ```json
//! {
//!   "port": 8080,
//!   "retry": { "mode": "on_demand", "min_interval_ms": 30000 },
//!   "databases": [
//!     { "lookup_type": "country", "file": "/data/country.mmdb",
//!       "attr": "country.iso_code", "fallback": "00" }
//!   ]
//! }
//! ```

use crate::error::ConfigError;
use crate::resolver::AttributePath;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default bind port
pub const DEFAULT_PORT: u16 = 6970;
/// Default HTTP worker count
pub const DEFAULT_WORKERS: usize = 4;

/// One lookup type backed by one database file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Unique key clients ask for, e.g. `country`
    pub lookup_type: String,
    /// Location of the `.mmdb` file
    #[serde(rename = "file")]
    pub file_path: PathBuf,
    /// Where the answer lives inside a record
    #[serde(rename = "attr")]
    pub attribute_path: AttributePath,
    /// Returned whenever the answer cannot be produced
    #[serde(rename = "fallback")]
    pub fallback_value: String,
}

impl DatabaseConfig {
    /// Build a config from a dotted attribute path
    pub fn new(
        lookup_type: impl Into<String>,
        file_path: impl Into<PathBuf>,
        attribute_path: &str,
        fallback_value: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            lookup_type: lookup_type.into(),
            file_path: file_path.into(),
            attribute_path: AttributePath::parse(attribute_path)?,
            fallback_value: fallback_value.into(),
        })
    }

    /// Environment variable that overrides this database's file
    pub fn env_var(&self) -> String {
        env_var_for(&self.lookup_type)
    }
}

/// `GEOIP_<TYPE>_DB` for a lookup type
pub fn env_var_for(lookup_type: &str) -> String {
    format!("GEOIP_{}_DB", lookup_type.to_ascii_uppercase())
}

/// Built-in database layouts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// GeoLite2 / GeoIP2 attribute layout
    #[default]
    MaxMind,
    /// IPinfo flat attribute layout
    IpInfo,
}

impl Preset {
    /// The five database entries of this layout, in configuration order
    pub fn databases(self) -> Vec<DatabaseConfig> {
        let attrs: [(&str, &str, &str, &str); 5] = match self {
            Preset::MaxMind => [
                ("country", "/tmp/country.mmdb", "country.iso_code", "00"),
                ("continent", "/tmp/country.mmdb", "continent.code", "00"),
                ("city", "/tmp/city.mmdb", "city.names.en", "-"),
                ("asn", "/tmp/asn.mmdb", "autonomous_system_number", "0"),
                ("asname", "/tmp/asn.mmdb", "autonomous_system_organization", "-"),
            ],
            Preset::IpInfo => [
                ("country", "/tmp/country.mmdb", "country", "00"),
                ("continent", "/tmp/country.mmdb", "continent", "00"),
                ("city", "/tmp/city.mmdb", "city", "-"),
                ("asn", "/tmp/asn.mmdb", "asn", "0"),
                ("asname", "/tmp/asn.mmdb", "name", "-"),
            ],
        };

        attrs
            .iter()
            .map(|&(lookup_type, file, attr, fallback)| DatabaseConfig {
                lookup_type: lookup_type.to_string(),
                file_path: PathBuf::from(file),
                attribute_path: AttributePath::from_trusted(attr),
                fallback_value: fallback.to_string(),
            })
            .collect()
    }
}

impl std::str::FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maxmind" => Ok(Preset::MaxMind),
            "ipinfo" => Ok(Preset::IpInfo),
            other => Err(ConfigError::InvalidValue {
                name: "preset".to_string(),
                reason: format!("unknown preset '{}' (expected maxmind or ipinfo)", other),
            }),
        }
    }
}

/// What to do about databases that failed to load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Load once at startup; failed types serve fallbacks until reload
    #[default]
    Never,
    /// Re-try opening a failed database from the request path, at most once
    /// per interval per lookup type
    OnDemand {
        /// Minimum milliseconds between attempts for one lookup type
        min_interval_ms: u64,
    },
}

impl RetryPolicy {
    /// Minimum interval between attempts, `None` when retry is off
    pub fn min_interval(&self) -> Option<Duration> {
        match self {
            RetryPolicy::Never => None,
            RetryPolicy::OnDemand { min_interval_ms } => {
                Some(Duration::from_millis(*min_interval_ms))
            }
        }
    }
}

/// Complete startup configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bind host for the HTTP layer
    pub host: String,
    /// Bind port for the HTTP layer
    pub port: u16,
    /// HTTP worker count
    pub workers: usize,
    /// Retry policy for failed databases
    pub retry: RetryPolicy,
    /// Databases, in configuration order
    pub databases: Vec<DatabaseConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}

impl ServiceConfig {
    /// Default settings with the given database layout
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            retry: RetryPolicy::default(),
            databases: preset.databases(),
        }
    }

    /// Load from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate JSON text
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                name: "workers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        validate_databases(&self.databases)
    }

    /// Apply `HOST`, `PORT`, `WORKERS` and `GEOIP_<TYPE>_DB` from the
    /// process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides using `lookup` as the environment
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = parse_setting("PORT", &port)?;
        }
        if let Some(workers) = lookup("WORKERS") {
            self.workers = parse_setting("WORKERS", &workers)?;
        }
        for database in &mut self.databases {
            if let Some(path) = lookup(&database.env_var()) {
                database.file_path = PathBuf::from(path);
            }
        }
        self.validate()
    }

    /// Point one lookup type at a different file
    pub fn set_database_path(
        &mut self,
        lookup_type: &str,
        path: impl Into<PathBuf>,
    ) -> Result<(), ConfigError> {
        let database = self
            .databases
            .iter_mut()
            .find(|db| db.lookup_type == lookup_type)
            .ok_or_else(|| ConfigError::InvalidValue {
                name: "lookup_type".to_string(),
                reason: format!("'{}' is not configured", lookup_type),
            })?;
        database.file_path = path.into();
        Ok(())
    }

    /// Config for one lookup type
    pub fn database(&self, lookup_type: &str) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|db| db.lookup_type == lookup_type)
    }

    /// `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Lookup types must be non-empty and unique
pub(crate) fn validate_databases(databases: &[DatabaseConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for database in databases {
        if database.lookup_type.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "lookup_type".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if !seen.insert(database.lookup_type.as_str()) {
            return Err(ConfigError::DuplicateLookupType(
                database.lookup_type.clone(),
            ));
        }
    }
    Ok(())
}

fn parse_setting<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("'{}': {}", value, e),
    })
}
