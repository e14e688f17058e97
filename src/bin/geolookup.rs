mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cli_utils::GlobalOpts;
use commands::{cmd_config, cmd_info, cmd_inspect, cmd_lookup};

#[derive(Parser)]
#[command(name = "geolookup")]
#[command(
    about = "Resolve IP addresses to geo and network attributes from MaxMind DB files",
    long_about = "geolookup - Low-latency GeoIP lookups over MaxMind DB (.mmdb) files\n\n\
    Resolves one attribute (country, continent, city, ASN, AS name) per query.\n\
    Missing databases, unknown addresses and absent attributes answer with the\n\
    configured fallback value; only malformed requests are errors.\n\n\
    Environment:\n\
      GEOIP_<TYPE>_DB   database file for a lookup type (e.g. GEOIP_CITY_DB)\n\
      HOST, PORT, WORKERS   bind settings reported to the HTTP layer\n\
      RUST_LOG          log filter (default: info)\n\n\
    Examples:\n\
      geolookup lookup country 8.8.8.8\n\
      geolookup --country-db ./GeoLite2-Country.mmdb lookup continent 1.1.1.1\n\
      geolookup --preset ipinfo info\n\
      geolookup inspect /tmp/asn.mmdb"
)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one IP address for one lookup type
    Lookup {
        /// Lookup type (country, continent, city, asn, asname, ...)
        #[arg(value_name = "TYPE")]
        lookup_type: String,

        /// IP address (IPv4 or IPv6)
        #[arg(value_name = "IP")]
        ip: String,

        /// Print the value together with how it was produced, as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show service status: supported lookups and database availability
    Info,

    /// Show the metadata of one database file
    Inspect {
        /// Path to the .mmdb file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    cli_utils::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Lookup {
            lookup_type,
            ip,
            json,
        } => cmd_lookup(&cli.global, lookup_type, ip, json),
        Commands::Info => cmd_info(&cli.global),
        Commands::Inspect { file } => cmd_inspect(file),
        Commands::Config => cmd_config(&cli.global),
    }
}
