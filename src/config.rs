use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::favorites::FAVORITES_FILE;
use crate::task::{DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5050";
pub const CONFIG_FILE: &str = "config.json";
pub const LOG_FILE: &str = "findmy-companion.log";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// User configuration, read from `config.json` and overridden from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub sync_timeout_secs: u64,
    pub select_timeout_secs: u64,
    pub screenshot_timeout_secs: u64,
    pub screenshot_all_timeout_secs: u64,
    /// Favorites and log file live here.
    pub data_dir: Option<PathBuf>,
    /// Saved screenshots go here.
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            sync_timeout_secs: 60,
            select_timeout_secs: DEFAULT_MAX_WAIT.as_secs(),
            screenshot_timeout_secs: 15,
            screenshot_all_timeout_secs: 30,
            data_dir: None,
            download_dir: None,
        }
    }
}

/// Per-action polling budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub poll_interval: Duration,
    pub sync: Duration,
    pub select: Duration,
    pub screenshot: Duration,
    pub screenshot_all: Duration,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "findmy", "findmy-companion")
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load `path` if given (it must exist), otherwise the default config file
    /// if present, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if required {
                    return Err(ConfigError::NotFound(path));
                }
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            sync: Duration::from_secs(self.sync_timeout_secs),
            select: Duration::from_secs(self.select_timeout_secs),
            screenshot: Duration::from_secs(self.screenshot_timeout_secs),
            screenshot_all: Duration::from_secs(self.screenshot_all_timeout_secs),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(|| {
                directories::UserDirs::new()
                    .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
            })
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn favorites_path(&self) -> PathBuf {
        self.data_dir().join(FAVORITES_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join(LOG_FILE)
    }
}
