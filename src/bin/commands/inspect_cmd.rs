use anyhow::{Context, Result};
use geolookup::Reader;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_unix_timestamp};

pub fn cmd_inspect(file: PathBuf) -> Result<()> {
    let reader = Reader::open(&file)
        .with_context(|| format!("Failed to load database: {}", file.display()))?;
    let metadata = reader
        .metadata()
        .with_context(|| format!("Failed to read metadata: {}", file.display()))?;

    let output = json!({
        "file": file.display().to_string(),
        "size": reader.size(),
        "size_human": format_bytes(reader.size()),
        "build_time": format_unix_timestamp(metadata.build_epoch),
        "metadata": metadata,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
