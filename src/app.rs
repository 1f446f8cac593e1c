use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{ProjectDirs, UserDirs};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::api::stomp::HeartBeat;
use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub reconnect_delay_ms: u64,
    pub heartbeat_ms: u64,
    /// Terminal width at which the sidebar stays docked.
    pub sidebar_breakpoint: usize,
    pub downloads_dir: Option<PathBuf>,
    pub open_exports: bool,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            reconnect_delay_ms: 5000,
            heartbeat_ms: 10000,
            sidebar_breakpoint: 100,
            downloads_dir: None,
            open_exports: true,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from("com", "example", "Tripper")?;
        Some(proj.config_dir().join("tripper.toml"))
    }

    /// Read the config file. A missing file yields defaults; a broken one is
    /// reported and also yields defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::new();
        };
        match Self::read(&path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::new(),
            Err(e) => {
                warn!("ignoring config {}: {e}", path.display());
                Self::new()
            }
        }
    }

    fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(toml::from_str(&text)?))
    }

    pub fn save(&self, path: Option<&Path>) -> Result<(), ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::default_path)
            .ok_or(ConfigError::NoConfigDir)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `TRIPPER_*` overrides from the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TRIPPER_API_URL") {
            self.api_url = url;
        }
        if let Some(raw) = lookup("TRIPPER_RECONNECT_MS") {
            self.reconnect_delay_ms = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "TRIPPER_RECONNECT_MS",
                value: raw.clone(),
            })?;
        }
        if let Some(dir) = lookup("TRIPPER_DOWNLOAD_DIR") {
            self.downloads_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn heart_beat(&self) -> HeartBeat {
        HeartBeat::new(self.heartbeat_ms, self.heartbeat_ms)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.downloads_dir
            .clone()
            .or_else(|| UserDirs::new().and_then(|u| u.download_dir().map(Path::to_path_buf)))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
