use anyhow::Result;
use geolookup::LookupService;

use crate::cli_utils::GlobalOpts;

/// Exit code for a malformed request (bad type or empty IP)
const EXIT_CLIENT_ERROR: i32 = 2;

pub fn cmd_lookup(global: &GlobalOpts, lookup_type: String, ip: String, json: bool) -> Result<()> {
    let config = global.load_config()?;
    let service = LookupService::new(&config)?;

    let resolution = match service.resolve(&lookup_type, &ip) {
        Ok(resolution) => resolution,
        Err(error) => {
            eprintln!("Error: {}", error);
            std::process::exit(EXIT_CLIENT_ERROR);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        println!("{}", resolution.value);
    }

    service.shutdown();
    Ok(())
}
