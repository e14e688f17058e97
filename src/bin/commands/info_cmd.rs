use anyhow::Result;
use geolookup::LookupService;

use crate::cli_utils::GlobalOpts;

pub fn cmd_info(global: &GlobalOpts) -> Result<()> {
    let config = global.load_config()?;
    let service = LookupService::new(&config)?;

    println!("{}", serde_json::to_string_pretty(&service.describe())?);
    Ok(())
}
