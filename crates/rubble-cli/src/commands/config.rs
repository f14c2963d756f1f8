//! Print the effective configuration

use anyhow::{Context, Result};
use rubble_runtime::SimConfig;

/// Load `path` if given, otherwise the defaults
pub fn load(path: Option<&str>) -> Result<SimConfig> {
    match path {
        Some(path) => {
            SimConfig::load(path).with_context(|| format!("Failed to load config '{path}'"))
        }
        None => Ok(SimConfig::default()),
    }
}

pub fn run(path: Option<&str>) -> Result<()> {
    let config = load(path)?;
    let text = config
        .to_toml_string()
        .context("Failed to serialize config")?;
    print!("{text}");
    Ok(())
}
