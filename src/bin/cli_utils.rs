use anyhow::{Context, Result};
use clap::Args;
use geolookup::{Preset, ServiceConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Options shared by every subcommand
#[derive(Args)]
pub struct GlobalOpts {
    /// JSON configuration file (replaces the preset)
    #[arg(long, global = true, value_name = "FILE", conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Built-in database layout: maxmind (default) or ipinfo
    #[arg(long, global = true, value_name = "NAME")]
    pub preset: Option<Preset>,

    /// Country database file
    #[arg(long, global = true, value_name = "FILE")]
    pub country_db: Option<PathBuf>,

    /// Continent database file
    #[arg(long, global = true, value_name = "FILE")]
    pub continent_db: Option<PathBuf>,

    /// City database file
    #[arg(long, global = true, value_name = "FILE")]
    pub city_db: Option<PathBuf>,

    /// ASN database file
    #[arg(long, global = true, value_name = "FILE")]
    pub asn_db: Option<PathBuf>,

    /// AS name database file
    #[arg(long, global = true, value_name = "FILE")]
    pub asname_db: Option<PathBuf>,
}

impl GlobalOpts {
    /// Effective configuration: preset or file, then environment, then flags
    pub fn load_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => ServiceConfig::from_preset(self.preset.unwrap_or_default()),
        };

        config
            .apply_env()
            .context("Invalid environment override")?;

        let overrides = [
            ("country", &self.country_db),
            ("continent", &self.continent_db),
            ("city", &self.city_db),
            ("asn", &self.asn_db),
            ("asname", &self.asname_db),
        ];
        for (lookup_type, path) in overrides {
            if let Some(path) = path {
                config
                    .set_database_path(lookup_type, path)
                    .with_context(|| format!("Cannot apply --{}-db", lookup_type))?;
            }
        }

        Ok(config)
    }
}

/// Log to stderr; `RUST_LOG` overrides the default `info` filter
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

pub fn format_unix_timestamp(timestamp: u64) -> String {
    let days = timestamp / 86400;
    let remaining = timestamp % 86400;
    let (year, month, day) = days_to_ymd(days);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        year,
        month,
        day,
        remaining / 3600,
        (remaining % 3600) / 60,
        remaining % 60
    )
}

// Convert days since Unix epoch to year/month/day
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    let mut remaining_days = days;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let days_in_months = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for &days_in_month in &days_in_months {
        if remaining_days < days_in_month {
            break;
        }
        remaining_days -= days_in_month;
        month += 1;
    }

    (year, month, remaining_days + 1)
}

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
