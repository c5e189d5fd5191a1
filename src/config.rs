//! Scan configuration and its JSON-backed store.
//!
//! A scan never reads the store while it runs: callers take a [`ScanConfig`]
//! snapshot and pass it into the scanner and probes.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default number of concurrent probes
pub const DEFAULT_MAX_WORKERS: usize = 30;

/// Default hard check targets
pub const DEFAULT_HARD_CHECK_SITES: [&str; 2] = ["https://www.google.com", "https://www.github.com"];

/// Most targets a hard check may require
pub const MAX_HARD_CHECK_SITES: usize = 2;

/// Default configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max workers must be a positive integer")]
    NonPositiveWorkers,

    #[error("hard check needs 1 or 2 sites, got {0}")]
    TargetCount(usize),

    #[error("invalid hard check site `{url}`: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("config file I/O: {0}")]
    Io(#[from] io::Error),

    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Settings captured at the start of each scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub max_workers: usize,
    pub hard_check_sites: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            hard_check_sites: DEFAULT_HARD_CHECK_SITES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        validate_max_workers(self.max_workers)?;
        validate_hard_check_sites(&self.hard_check_sites)
    }
}

pub fn validate_max_workers(max_workers: usize) -> ConfigResult<()> {
    if max_workers == 0 {
        return Err(ConfigError::NonPositiveWorkers);
    }
    Ok(())
}

/// 1 or 2 absolute `http://` / `https://` URLs with a host
pub fn validate_hard_check_sites(sites: &[String]) -> ConfigResult<()> {
    if sites.is_empty() || sites.len() > MAX_HARD_CHECK_SITES {
        return Err(ConfigError::TargetCount(sites.len()));
    }

    for site in sites {
        let invalid = |reason: &str| ConfigError::InvalidTarget {
            url: site.clone(),
            reason: reason.to_string(),
        };
        let lower = site.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(invalid("must start with http:// or https://"));
        }
        let url = Url::parse(site).map_err(|e| invalid(&e.to_string()))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host"));
        }
    }
    Ok(())
}

/// Configuration provider persisted as pretty-printed JSON
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: ScanConfig,
}

impl ConfigStore {
    /// Load the file, or create it with defaults.
    ///
    /// An unreadable or invalid file is replaced by the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();

        let current = if path.exists() {
            match Self::read(&path) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    return Ok(Self {
                        path,
                        current: config,
                    });
                }
                Err(e) => {
                    warn!("Config file {} rejected ({}), using defaults", path.display(), e);
                    ScanConfig::default()
                }
            }
        } else {
            debug!("Config file not found, writing defaults to {}", path.display());
            ScanConfig::default()
        };

        let store = Self { path, current };
        store.save()?;
        Ok(store)
    }

    fn read(path: &Path) -> ConfigResult<ScanConfig> {
        let contents = fs::read_to_string(path)?;
        let config: ScanConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> ConfigResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let contents = serde_json::to_string_pretty(&self.current)?;
        fs::write(&self.path, contents)?;
        debug!("Saved config to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_workers(&self) -> usize {
        self.current.max_workers
    }

    pub fn hard_check_targets(&self) -> &[String] {
        &self.current.hard_check_sites
    }

    /// Copy of the current settings for one scan
    pub fn snapshot(&self) -> ScanConfig {
        self.current.clone()
    }

    /// Validate and persist a new worker count; the old value stays on error
    pub fn set_max_workers(&mut self, max_workers: usize) -> ConfigResult<()> {
        validate_max_workers(max_workers)?;
        self.update(|config| config.max_workers = max_workers)?;
        info!(max_workers, "max workers updated");
        Ok(())
    }

    /// Validate and persist new hard check targets; the old list stays on error
    pub fn set_hard_check_targets(&mut self, sites: Vec<String>) -> ConfigResult<()> {
        validate_hard_check_sites(&sites)?;
        self.update(|config| config.hard_check_sites = sites)?;
        info!(sites = ?self.current.hard_check_sites, "hard check sites updated");
        Ok(())
    }

    /// Apply `change`, rolling back if the file cannot be written
    fn update<F: FnOnce(&mut ScanConfig)>(&mut self, change: F) -> ConfigResult<()> {
        let previous = self.current.clone();
        change(&mut self.current);
        if let Err(e) = self.save() {
            self.current = previous;
            return Err(e);
        }
        Ok(())
    }
}
