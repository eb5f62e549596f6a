//! Engine configuration: cache sizing and the zoneinfo search path.
//!
//! Configuration can come from a TOML document:
//!
//! ```toml
//! [cache]
//! strong_capacity = 16
//!
//! [tzpath]
//! search_paths = ["/usr/share/zoneinfo", "/opt/tzdata"]
//! ```
//!
//! and from the environment, which takes precedence:
//!
//! - `ZONEINFO_TZPATH` -- `:`-separated absolute directories (empty means none)
//! - `ZONEINFO_CACHE_SIZE` -- MRU capacity of the shared cache

use crate::cache::DEFAULT_STRONG_CAPACITY;
use crate::error::{Result, ZoneInfoError};
use crate::tzpath::DEFAULT_SEARCH_PATHS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const TZPATH_ENV: &str = "ZONEINFO_TZPATH";
pub const CACHE_SIZE_ENV: &str = "ZONEINFO_CACHE_SIZE";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub tzpath: TzPathConfig,
}

/// Sizing of the shared instance cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// How many recently used zones stay alive with no outside reference.
    pub strong_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strong_capacity: DEFAULT_STRONG_CAPACITY,
        }
    }
}

/// Where zone files are looked up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TzPathConfig {
    /// Directories searched in order. Must be absolute.
    pub search_paths: Vec<PathBuf>,
}

impl Default for TzPathConfig {
    fn default() -> Self {
        Self {
            search_paths: DEFAULT_SEARCH_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string. Missing sections take defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ZoneInfoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ZoneInfoError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Apply `ZONEINFO_TZPATH` / `ZONEINFO_CACHE_SIZE` on top of this configuration.
    pub fn merge_env(self) -> Result<Self> {
        self.merge_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup` (an environment stand-in).
    ///
    /// Relative entries in the search path are dropped with a warning.
    pub fn merge_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(TZPATH_ENV) {
            let (absolute, relative): (Vec<PathBuf>, Vec<PathBuf>) = raw
                .split(':')
                .filter(|part| !part.is_empty())
                .map(PathBuf::from)
                .partition(|p| p.is_absolute());
            if !relative.is_empty() {
                tracing::warn!(
                    paths = ?relative,
                    "{} entries must be absolute, ignoring relative paths",
                    TZPATH_ENV
                );
            }
            self.tzpath.search_paths = absolute;
        }

        if let Some(raw) = lookup(CACHE_SIZE_ENV) {
            self.cache.strong_capacity = raw.trim().parse().map_err(|_| {
                ZoneInfoError::Config(format!(
                    "{} must be a non-negative integer, got {:?}",
                    CACHE_SIZE_ENV, raw
                ))
            })?;
        }

        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if let Some(relative) = self.tzpath.search_paths.iter().find(|p| !p.is_absolute()) {
            return Err(ZoneInfoError::Config(format!(
                "search paths must be absolute, got {}",
                relative.display()
            )));
        }
        Ok(())
    }
}
