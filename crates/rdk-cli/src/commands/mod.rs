//! Command handler modules for rdk-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod results;
pub mod validate;

use anyhow::Result;
use rdk_config::LoadedConfig;
use rdk_pipeline::ValidationConfig;

/// Load and validate layered config. No paths means the standard preset.
pub fn load_validation_config(paths: &[String]) -> Result<(ValidationConfig, String)> {
    let loaded = if paths.is_empty() {
        LoadedConfig::empty()
    } else {
        let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        rdk_config::load_layered_yaml(&path_refs)?
    };
    let config = ValidationConfig::from_loaded(&loaded)?;
    Ok((config, loaded.config_hash))
}
