//! Client configuration.
//!
//! Values are layered: built-in defaults, then the workspace settings file
//! (`.agenthive/settings.json`), then environment variables. The CLI applies
//! its own flags last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::reconnect::ReconnectPolicy;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_SESSION_LIST_LIMIT: usize = 50;

/// Environment variables read by [`ClientConfig::apply_env`], preferred name first.
pub const ENV_API_BASE_URL: [&str; 2] = ["AGENTHIVE_API_BASE_URL", "VITE_API_BASE_URL"];
pub const ENV_AUTH_ENABLED: [&str; 2] = ["AGENTHIVE_AUTH_ENABLED", "VITE_AUTH_ENABLED"];

/// Runtime configuration for the client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend origin, without trailing slash
    pub api_base_url: String,
    /// When false, no auth guard is applied to requests
    pub auth_enabled: bool,
    pub request_timeout: Duration,
    /// Delay between health checks while connected
    pub health_interval: Duration,
    /// Per-check timeout
    pub health_timeout: Duration,
    pub session_list_limit: usize,
    /// Backoff after failed health checks
    pub reconnect: ReconnectPolicy,
    /// Backoff while waiting for a created session to become readable
    pub readiness: ReconnectPolicy,
    /// How long a cached API response is served before it is refetched
    pub cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_enabled: true,
            request_timeout: Duration::from_secs(30),
            health_interval: Duration::from_secs(5),
            health_timeout: Duration::from_secs(3),
            session_list_limit: DEFAULT_SESSION_LIST_LIMIT,
            reconnect: ReconnectPolicy::default(),
            readiness: ReconnectPolicy::readiness(),
            cache_ttl: Duration::from_secs(5),
        }
    }
}

/// On-disk settings; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    pub api_base_url: Option<String>,
    pub auth_enabled: Option<bool>,
    pub request_timeout_ms: Option<u64>,
    pub health_interval_ms: Option<u64>,
    pub health_timeout_ms: Option<u64>,
    pub session_list_limit: Option<usize>,
    pub cache_ttl_ms: Option<u64>,
}

impl ClientConfig {
    /// Defaults, then settings file under `workspace_root`, then environment.
    pub fn load(workspace_root: impl AsRef<Path>) -> ClientResult<Self> {
        let mut config = Self::default();
        let path = Self::settings_path(workspace_root.as_ref());
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let settings: SettingsFile = serde_json::from_str(&content)?;
            debug!(path = %path.display(), "Loaded client settings");
            config.apply_settings(&settings);
        }
        config.apply_env();
        config.validate()
    }

    /// Defaults overridden by environment only.
    pub fn from_env() -> ClientResult<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()
    }

    pub fn settings_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".agenthive").join("settings.json")
    }

    pub fn apply_settings(&mut self, settings: &SettingsFile) {
        if let Some(url) = &settings.api_base_url {
            self.api_base_url = url.clone();
        }
        if let Some(enabled) = settings.auth_enabled {
            self.auth_enabled = enabled;
        }
        if let Some(ms) = settings.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = settings.health_interval_ms {
            self.health_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = settings.health_timeout_ms {
            self.health_timeout = Duration::from_millis(ms);
        }
        if let Some(limit) = settings.session_list_limit {
            self.session_list_limit = limit;
        }
        if let Some(ms) = settings.cache_ttl_ms {
            self.cache_ttl = Duration::from_millis(ms);
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides from an arbitrary lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .find(|v| !v.trim().is_empty())
        };
        if let Some(url) = first(&ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(flag) = first(&ENV_AUTH_ENABLED) {
            self.auth_enabled = !flag.trim().eq_ignore_ascii_case("false");
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_readiness(mut self, policy: ReconnectPolicy) -> Self {
        self.readiness = policy;
        self
    }

    /// Check the base URL and normalise its trailing slash.
    pub fn validate(mut self) -> ClientResult<Self> {
        let url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::InvalidConfig(format!(
                "API base URL must start with http:// or https://, got {:?}",
                self.api_base_url
            )));
        }
        if self.health_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "health timeout must be greater than zero".to_string(),
            ));
        }
        self.api_base_url = url;
        Ok(self)
    }
}
