use anyhow::Result;

use crate::cli_utils::GlobalOpts;

pub fn cmd_config(global: &GlobalOpts) -> Result<()> {
    let config = global.load_config()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
