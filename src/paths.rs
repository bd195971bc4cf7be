//! Centralized path resolution for opkit
//!
//! # Environment Variables
//!
//! - `OPKIT_CONFIG_DIR` - Override config directory
//! - `OPKIT_OBJECTS_DIR` - Override the watched objects directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `OPKIT_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/opkit` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\opkit`
//!    - macOS/Linux: `~/.config/opkit`
//!
//! The objects directory defaults to `<config_dir>/objects`.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "OPKIT_CONFIG_DIR";

/// Environment variable for objects directory override
pub const ENV_OBJECTS_DIR: &str = "OPKIT_OBJECTS_DIR";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "opkit.toml";

/// Get the opkit config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("opkit");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join("opkit");
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("opkit");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Default location of `opkit.toml`
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Directory watched for PathSet objects when the config does not name one
pub fn default_objects_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_OBJECTS_DIR) {
        return Ok(expand(&dir));
    }
    Ok(config_dir()?.join("objects"))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left untouched.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
