//! Connection acceptance and the state shared by all connections.

pub mod listener;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialGate, MemoryCredentialStore};
use crate::config::Config;
use crate::http::response::KeepAliveParams;

/// Read-only settings and collaborators every connection needs.
pub struct ServerContext {
    /// Directory that request paths are appended to
    pub root: PathBuf,
    pub keep_alive: KeepAliveParams,
    pub idle_timeout: Duration,
    pub gate: Arc<dyn CredentialGate>,
}

impl ServerContext {
    pub fn new(root: impl Into<PathBuf>, gate: Arc<dyn CredentialGate>) -> Self {
        Self {
            root: root.into(),
            keep_alive: KeepAliveParams::default(),
            idle_timeout: Duration::from_secs(60),
            gate,
        }
    }

    /// Builds the context from config, with an in-memory user store seeded
    /// from `users`.
    pub fn from_config(cfg: &Config) -> Self {
        let store = MemoryCredentialStore::with_users(
            cfg.users
                .iter()
                .map(|u| (u.username.clone(), u.password.clone())),
        );
        Self {
            root: cfg.static_files.root.clone(),
            keep_alive: cfg.server.keep_alive_params(),
            idle_timeout: Duration::from_secs(cfg.server.idle_timeout_secs),
            gate: Arc::new(store),
        }
    }
}
