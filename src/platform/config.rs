//! Platform credentials resolved from the environment.

use std::fmt;
use std::time::Duration;

use super::PlatformError;

pub const DEFAULT_API_BASE: &str = "https://api.vercel.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 12_000;
pub const MIN_TIMEOUT_MS: u64 = 2_000;
pub const MAX_TIMEOUT_MS: u64 = 60_000;

pub const ENV_TOKEN: &str = "VERCEL_TOKEN";
pub const ENV_PROJECT_ID: &str = "VERCEL_PROJECT_ID";
pub const ENV_TEAM_ID: &str = "VERCEL_TEAM_ID";
pub const ENV_TIMEOUT_MS: &str = "VERCEL_API_TIMEOUT_MS";
pub const ENV_API_BASE: &str = "VERCEL_API_BASE";

/// Everything the client needs to talk to the platform.
#[derive(Clone)]
pub struct PlatformConfig {
    pub token: String,
    pub project_id: String,
    pub team_id: Option<String>,
    pub timeout: Duration,
    pub api_base: String,
}

impl PlatformConfig {
    /// Resolve from process environment.
    pub fn from_env() -> Result<Self, PlatformError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PlatformError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let token = get(ENV_TOKEN)
            .ok_or_else(|| PlatformError::Config(format!("{ENV_TOKEN} is not set")))?;
        let project_id = get(ENV_PROJECT_ID)
            .ok_or_else(|| PlatformError::Config(format!("{ENV_PROJECT_ID} is not set")))?;

        let timeout_ms = get(ENV_TIMEOUT_MS)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);

        Ok(Self {
            token,
            project_id,
            team_id: get(ENV_TEAM_ID),
            timeout: Duration::from_millis(timeout_ms),
            api_base: get(ENV_API_BASE).unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

// Keep the token out of logs.
impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("token", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("team_id", &self.team_id)
            .field("timeout", &self.timeout)
            .field("api_base", &self.api_base)
            .finish()
    }
}
