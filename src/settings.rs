//! TOML settings for passes and the HTTP surface.
//!
//! Lookup order: the file named by `DEPLOYWATCH_CONFIG`, then
//! `./deploywatch.toml`, then compiled-in defaults. Platform credentials are
//! not read from here; see [`crate::platform::PlatformConfig`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::burst::DEFAULT_BURST_THRESHOLD;
use crate::platform::client::{DEFAULT_DEPLOYMENT_LIMIT, DEFAULT_EVENT_LIMIT};

pub const ENV_CONFIG_PATH: &str = "DEPLOYWATCH_CONFIG";
pub const LOCAL_CONFIG_PATH: &str = "deploywatch.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse settings file: {}", path.display()))?;
        info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(settings) => return settings,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "DEPLOYWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG_PATH);
        if local.exists() {
            match Self::load(local) {
                Ok(settings) => return settings,
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "settings file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no settings file found, using compiled-in defaults");
        Self::default()
    }
}

/// Defaults for a classification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Identical 4xx records needed before a group is surfaced.
    pub burst_threshold: usize,
    pub deployment_limit: usize,
    pub event_limit: usize,
    /// Look-back from now.
    pub window_minutes: i64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            burst_threshold: DEFAULT_BURST_THRESHOLD,
            deployment_limit: DEFAULT_DEPLOYMENT_LIMIT,
            event_limit: DEFAULT_EVENT_LIMIT,
            window_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}
