//! Application configuration management.
//!
//! Settings are merged in layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. `config.toml` in the platform config directory
//! 3. `DUPFU_*` environment variables (e.g. `DUPFU_WORKERS=8`)
//! 4. command-line flags (applied by the binary)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::{ActionConfig, DEFAULT_MANIFEST_NAME};
use crate::pipeline::{ScanConfig, DEFAULT_HASH_QUEUE, DEFAULT_WALK_QUEUE};
use crate::scanner::{WalkerConfig, DEFAULT_BUFFER_SIZE};

/// Prefix of environment variables read by [`Config::figment`].
pub const ENV_PREFIX: &str = "DUPFU_";

/// Default destination directory name, relative to the scan root.
pub const DEFAULT_DESTINATION_DIR: &str = ".dup-fu";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fingerprint workers; 0 means available parallelism.
    pub workers: usize,
    /// Capacity of the walker → fingerprinter queue.
    pub walk_queue_capacity: usize,
    /// Capacity of the fingerprinter → aggregator queue.
    pub hash_queue_capacity: usize,
    /// Read buffer per worker, in bytes.
    pub read_buffer_size: usize,
    /// Interval between progress snapshots, in milliseconds.
    pub stats_interval_ms: u64,
    /// File name of the exported manifest.
    pub manifest_name: String,
    /// Destination directory name used when none is given.
    pub destination_dir_name: String,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Gitignore-style patterns to skip.
    pub ignore_patterns: Vec<String>,
    /// Re-check and byte-compare duplicates before deleting or moving them.
    pub verify_before_action: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 0,
            walk_queue_capacity: DEFAULT_WALK_QUEUE,
            hash_queue_capacity: DEFAULT_HASH_QUEUE,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            stats_interval_ms: 1000,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            destination_dir_name: DEFAULT_DESTINATION_DIR.to_string(),
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            verify_before_action: true,
        }
    }
}

impl Config {
    /// Load from the default platform-specific path, falling back to
    /// defaults (with a warning) if the file is malformed.
    #[must_use]
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(path.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring invalid configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Load with `path` as the file layer (if any).
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an environment variable cannot be
    /// parsed into a [`Config`].
    pub fn load_from(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// The layered figment: defaults, then `path`, then `DUPFU_*` variables.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            log::debug!("Reading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupfu", "dupfu").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Pipeline settings. `exclude` is left out of the walk (the destination
    /// directory, typically).
    #[must_use]
    pub fn scan_config(&self, exclude: Option<&Path>) -> ScanConfig {
        let mut walker = WalkerConfig::new(self.skip_hidden, self.ignore_patterns.clone());
        if let Some(dir) = exclude {
            walker = walker.with_excluded_dir(dir.to_path_buf());
        }
        ScanConfig::default()
            .with_workers(self.workers)
            .with_queue_capacities(self.walk_queue_capacity, self.hash_queue_capacity)
            .with_read_buffer_size(self.read_buffer_size)
            .with_stats_interval(Duration::from_millis(self.stats_interval_ms))
            .with_walker_config(walker)
    }

    /// Action settings.
    #[must_use]
    pub fn action_config(&self, permanent: bool) -> ActionConfig {
        let base = if permanent {
            ActionConfig::permanent()
        } else {
            ActionConfig::trash()
        };
        base.with_verify(self.verify_before_action)
            .with_manifest_name(self.manifest_name.clone())
    }

    /// Destination used when none is given: `<root>/<destination_dir_name>`.
    #[must_use]
    pub fn default_destination(&self, root: &Path) -> PathBuf {
        root.join(&self.destination_dir_name)
    }
}
