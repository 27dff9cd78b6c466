//! Configuration file discovery for the CLI

use anyhow::{Context, Result};
use connector_lib::ConnectorConfig;
use std::path::{Path, PathBuf};

/// Default configuration file, `~/.config/rexsync/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("rexsync").join("config.toml"))
}

/// Pick the file to read: an explicit path, else the default one when it exists
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|path| path.exists()),
    }
}

/// Load the connector configuration, file first then `REX_*` environment
pub fn load(explicit: Option<&Path>) -> Result<ConnectorConfig> {
    let path = resolve_config_path(explicit);
    ConnectorConfig::load(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from the environment".to_string(),
    })
}
