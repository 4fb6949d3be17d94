//! Configuration loading and path resolution.
//!
//! Everything lives under `~/.tabtime/`:
//! - `config.json`: optional [`TrackerConfig`]
//! - `sessions.json`: the main-session store
//! - `logs/`: host log files
//!
//! A missing or malformed config file is not an error; defaults apply.

use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, TrackerError};
use crate::stats::DailyAverageMode;

const DEFAULT_TOP_SITES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TrackerConfig {
    /// Overrides `~/.tabtime/sessions.json`.
    pub storage_path: Option<PathBuf>,
    /// Overrides `~/.tabtime/logs`.
    pub log_dir: Option<PathBuf>,
    pub daily_average: DailyAverageMode,
    pub top_sites: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            storage_path: None,
            log_dir: None,
            daily_average: DailyAverageMode::default(),
            top_sites: DEFAULT_TOP_SITES,
        }
    }
}

impl TrackerConfig {
    pub fn resolve_storage_path(&self) -> Result<PathBuf> {
        match &self.storage_path {
            Some(path) => Ok(path.clone()),
            None => default_storage_path().ok_or(TrackerError::NoStoragePath),
        }
    }

    pub fn resolve_log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .clone()
            .or_else(|| get_tabtime_dir().map(|dir| dir.join("logs")))
    }
}

/// Returns the path to the tabtime directory (~/.tabtime).
pub fn get_tabtime_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tabtime"))
}

pub fn default_config_path() -> Option<PathBuf> {
    get_tabtime_dir().map(|dir| dir.join("config.json"))
}

pub fn default_storage_path() -> Option<PathBuf> {
    get_tabtime_dir().map(|dir| dir.join("sessions.json"))
}

/// Loads the config at `path` (or the default location), returning defaults
/// if the file is missing or malformed.
pub fn load_config(path: Option<&Path>) -> TrackerConfig {
    let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
        return TrackerConfig::default();
    };
    if !path.exists() {
        return TrackerConfig::default();
    }

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            warn!(error = %err, "Failed to read config; using defaults");
            return TrackerConfig::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Config malformed; using defaults");
            TrackerConfig::default()
        }
    }
}
