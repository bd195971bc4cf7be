//! `opkit.toml` configuration
//!
//! ```toml
//! [operator]
//! objects_dir = "~/opkit/objects"
//! poll_interval_ms = 1000
//! resync_interval_secs = 300
//! ensure_crd = true
//!
//! # Framework policy: boot, event loop, CRD creation
//! [backoff]
//! initial_interval_ms = 500
//! max_elapsed_ms = 900000
//!
//! # Per-handler operation retries
//! [retry]
//! max_attempts = 3
//! ```

use anyhow::{Context, Result};
use reconcile::BackoffConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub operator: OperatorConfig,
    pub backoff: BackoffConfig,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operator: OperatorConfig::default(),
            backoff: BackoffConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Directory holding PathSet objects; defaults to `<config_dir>/objects`
    pub objects_dir: Option<String>,
    pub poll_interval_ms: u64,
    /// Re-emit every known object this often; 0 disables resync
    pub resync_interval_secs: u64,
    /// Write the PathSet definition into the objects directory at boot
    pub ensure_crd: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            objects_dir: None,
            poll_interval_ms: 1000,
            resync_interval_secs: 300,
            ensure_crd: true,
        }
    }
}

/// Per-handler retry policy
///
/// Same fields as `[backoff]` but with its own defaults, so a partial
/// `[retry]` table only overrides the keys it names. Handler retries are
/// short; the event loop re-runs the pass anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
    /// 0 disables the elapsed-time cap
    pub max_elapsed_ms: u64,
    /// 0 disables the attempt cap
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 100,
            multiplier: 2.0,
            max_interval_ms: 2_000,
            max_elapsed_ms: 0,
            max_attempts: 3,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial_interval_ms: self.initial_interval_ms,
            multiplier: self.multiplier,
            max_interval_ms: self.max_interval_ms,
            max_elapsed_ms: self.max_elapsed_ms,
            max_attempts: self.max_attempts,
        }
    }
}

impl Config {
    /// Load from `path`, or from the config directory when `path` is `None`.
    ///
    /// A missing default file yields the defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (crate::paths::config_file()?, false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format in opkit config")
    }

    pub fn objects_dir(&self) -> Result<PathBuf> {
        match &self.operator.objects_dir {
            Some(dir) => Ok(crate::paths::expand(dir)),
            None => crate::paths::default_objects_dir(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.operator.poll_interval_ms.max(10))
    }

    pub fn resync_interval(&self) -> Option<Duration> {
        (self.operator.resync_interval_secs > 0)
            .then(|| Duration::from_secs(self.operator.resync_interval_secs))
    }
}
