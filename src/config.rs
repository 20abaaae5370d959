use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::http::response::KeepAliveParams;

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "PAGEWIRE_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub logging: LoggingConfig,
    /// Accounts known at startup
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Advertised in the `keep-alive` response header
    pub keep_alive_max: u32,
    pub keep_alive_timeout: u64,
    /// Idle time after which a connection without a full request is dropped
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let keep_alive = KeepAliveParams::default();
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            keep_alive_max: keep_alive.max,
            keep_alive_timeout: keep_alive.timeout_secs,
            idle_timeout_secs: 60,
        }
    }
}

impl ServerConfig {
    pub fn keep_alive_params(&self) -> KeepAliveParams {
        KeepAliveParams {
            max: self.keep_alive_max,
            timeout_secs: self.keep_alive_timeout,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory that request paths are appended to
    pub root: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./resources"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
}

impl Config {
    /// Loads the file named by `PAGEWIRE_CONFIG`, or the defaults when unset.
    /// `LISTEN` overrides the listen address either way.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = addr;
        }
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}
