//! Application configuration management.
//!
//! This module handles loading and saving the console configuration, which
//! includes the console host (used to pick the API origin), the origin used
//! for local development, the last email used to log in and the selected
//! tenant.
//!
//! Configuration is stored at `~/.config/feedbackbot/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "feedbackbot";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Console host names and the API origin each one talks to.
const HOST_MAP: &[(&str, &str)] = &[
    ("feedbackbot.lavina.tech", "https://api-feedbackbot.lavina.tech"),
    ("stage-feedbackbot.lavina.tech", "https://api-stage-feedbackbot.lavina.tech"),
    ("localhost", LOCAL_API_BASE),
];

/// API base for local and unrecognized hosts, relative to the local origin
pub const LOCAL_API_BASE: &str = "/api";

const DEFAULT_HOST: &str = "localhost";

const DEFAULT_LOCAL_ORIGIN: &str = "http://localhost:8080";

/// Environment variable overriding the configured host
pub const HOST_ENV: &str = "FEEDBACKBOT_HOST";

/// Environment variable overriding the configured local origin
pub const ORIGIN_ENV: &str = "FEEDBACKBOT_ORIGIN";

/// Map a console host name to its API base URL.
pub fn resolve_base_url(host: &str) -> &'static str {
    HOST_MAP
        .iter()
        .find(|(known, _)| *known == host)
        .map(|(_, base)| *base)
        .unwrap_or(LOCAL_API_BASE)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub host: Option<String>,
    pub local_origin: Option<String>,
    pub last_email: Option<String>,
    pub tenant_id: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply `FEEDBACKBOT_HOST` / `FEEDBACKBOT_ORIGIN` on top of the file values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var(HOST_ENV) {
            debug!(host = %host, "Host overridden from environment");
            self.host = Some(host);
        }
        if let Ok(origin) = std::env::var(ORIGIN_ENV) {
            debug!(origin = %origin, "Local origin overridden from environment");
            self.local_origin = Some(origin);
        }
        self
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn local_origin(&self) -> &str {
        self.local_origin.as_deref().unwrap_or(DEFAULT_LOCAL_ORIGIN)
    }

    /// Absolute API base URL. A relative base (local development) is joined
    /// onto the local origin.
    pub fn api_base_url(&self) -> String {
        let base = resolve_base_url(self.host());
        if base.starts_with('/') {
            format!("{}{}", self.local_origin().trim_end_matches('/'), base)
        } else {
            base.to_string()
        }
    }
}
