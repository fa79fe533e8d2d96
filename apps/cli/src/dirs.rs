use std::path::PathBuf;

use anyhow::{Context, Result};

const DATA_DIR_ENV: &str = "LLM_METERING_DATA_DIR";
const DATA_DIR_NAME: &str = ".llm-metering";

pub const DB_FILE_NAME: &str = "metering.sqlite";

pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("resolve HOME")?;
    Ok(PathBuf::from(home).join(DATA_DIR_NAME))
}
