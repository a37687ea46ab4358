//! Configuration module
//!
//! Client configuration is read from the environment (after loading a `.env`
//! file when present). Every value has a default so a bare environment yields a
//! client pointed at a local backend.

use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

// Common constants
const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_API_PREFIX: &str = "/api/v1";
const HTTP_TIMEOUT_SECS: u64 = 60;
const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";
const UPLOAD_PATH: &str = "/upload";
const CACHE_CAPACITY: usize = 256;

/// What the request client returns after a 401 triggered a successful refresh
/// and the original request was replayed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// Replay result is discarded and the original 401 response is returned.
    #[default]
    ReturnOriginal,
    /// Replay result is returned to the caller.
    ReturnReplay,
}

impl FromStr for ReplayPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "original" | "return_original" => Ok(ReplayPolicy::ReturnOriginal),
            "replay" | "return_replay" => Ok(ReplayPolicy::ReturnReplay),
            other => Err(ConfigError::InvalidValue {
                name: "BAZAAR_REFRESH_REPLAY",
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration for the authenticated API client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    /// Prefix prepended to resource paths (e.g. "/api/v1").
    pub api_prefix: String,
    pub timeout_secs: u64,
    pub login_path: String,
    pub refresh_path: String,
    pub upload_path: String,
    /// Maximum number of cached query results.
    pub cache_capacity: usize,
    pub replay_policy: ReplayPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeout_secs: HTTP_TIMEOUT_SECS,
            login_path: LOGIN_PATH.to_string(),
            refresh_path: REFRESH_PATH.to_string(),
            upload_path: UPLOAD_PATH.to_string(),
            cache_capacity: CACHE_CAPACITY,
            replay_policy: ReplayPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Client config pointed at `api_url`, everything else defaulted.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source. `from_env` passes
    /// the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("BAZAAR_API_URL")
            .or_else(|| lookup("API_URL"))
            .unwrap_or(defaults.api_url)
            .trim_end_matches('/')
            .to_string();

        let timeout_secs = match lookup("BAZAAR_HTTP_TIMEOUT_SECS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "BAZAAR_HTTP_TIMEOUT_SECS",
                    value: v.clone(),
                })?,
            None => defaults.timeout_secs,
        };

        let cache_capacity = match lookup("BAZAAR_CACHE_CAPACITY") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "BAZAAR_CACHE_CAPACITY",
                    value: v.clone(),
                })?,
            None => defaults.cache_capacity,
        };

        let replay_policy = match lookup("BAZAAR_REFRESH_REPLAY") {
            Some(v) => v.parse::<ReplayPolicy>()?,
            None => defaults.replay_policy,
        };

        let config = Self {
            api_url,
            api_prefix: lookup("BAZAAR_API_PREFIX").unwrap_or(defaults.api_prefix),
            timeout_secs,
            login_path: lookup("BAZAAR_LOGIN_PATH").unwrap_or(defaults.login_path),
            refresh_path: lookup("BAZAAR_REFRESH_PATH").unwrap_or(defaults.refresh_path),
            upload_path: lookup("BAZAAR_UPLOAD_PATH").unwrap_or(defaults.upload_path),
            cache_capacity,
            replay_policy,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "BAZAAR_API_URL must start with http:// or https://".to_string(),
            ));
        }

        for (name, path) in [
            ("BAZAAR_LOGIN_PATH", &self.login_path),
            ("BAZAAR_REFRESH_PATH", &self.refresh_path),
            ("BAZAAR_UPLOAD_PATH", &self.upload_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!("{} must start with '/'", name)));
            }
        }

        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(
                "BAZAAR_API_PREFIX must start with '/'".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "BAZAAR_HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "BAZAAR_CACHE_CAPACITY must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
