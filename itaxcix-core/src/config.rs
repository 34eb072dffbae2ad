//! Client configuration
//!
//! Defaults point at the production backend. Each field can be overridden
//! through an `ITAXCIX_*` environment variable.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{AppError, AppResult};

pub const DEFAULT_API_URL: &str = "https://api.itaxcix.com/api/v1";
pub const DEFAULT_WS_URL: &str = "wss://ws.itaxcix.com";
pub const DEFAULT_DB_FILE: &str = "itaxcix.db";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_URL: &str = "ITAXCIX_API_URL";
pub const ENV_WS_URL: &str = "ITAXCIX_WS_URL";
pub const ENV_DB_PATH: &str = "ITAXCIX_DB_PATH";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "ITAXCIX_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST base URL, without trailing slash
    pub api_url: String,
    /// Push channel endpoint
    pub ws_url: String,
    /// SQLite file backing the preference store
    pub db_path: PathBuf,
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(api_url) = lookup(ENV_API_URL) {
            config.api_url = api_url;
        }
        if let Some(ws_url) = lookup(ENV_WS_URL) {
            config.ws_url = ws_url;
        }
        if let Some(db_path) = lookup(ENV_DB_PATH) {
            config.db_path = PathBuf::from(db_path);
        }
        if let Some(secs) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                AppError::Config(format!("{ENV_HTTP_TIMEOUT_SECS} must be a whole number of seconds"))
            })?;
            config.http_timeout = Duration::from_secs(secs);
        }

        config.validate()
    }

    /// Check URL schemes and normalise the API base URL
    pub fn validate(mut self) -> AppResult<Self> {
        let api = Url::parse(&self.api_url)
            .map_err(|e| AppError::Config(format!("invalid API URL {}: {}", self.api_url, e)))?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "API URL must use http or https: {}",
                self.api_url
            )));
        }

        let ws = Url::parse(&self.ws_url)
            .map_err(|e| AppError::Config(format!("invalid WebSocket URL {}: {}", self.ws_url, e)))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(AppError::Config(format!(
                "WebSocket URL must use ws or wss: {}",
                self.ws_url
            )));
        }

        if self.http_timeout.is_zero() {
            return Err(AppError::Config("HTTP timeout must be positive".to_string()));
        }

        self.api_url = self.api_url.trim_end_matches('/').to_string();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (ENV_API_URL, "http://localhost:8080/api/v1/"),
            (ENV_WS_URL, "ws://localhost:8081"),
            (ENV_DB_PATH, "/tmp/itaxcix-test.db"),
            (ENV_HTTP_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "http://localhost:8080/api/v1");
        assert_eq!(config.ws_url, "ws://localhost:8081");
        assert_eq!(config.db_path, PathBuf::from("/tmp/itaxcix-test.db"));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_wrong_schemes() {
        let err = ClientConfig::from_lookup(lookup_from(&[(ENV_WS_URL, "https://ws.itaxcix.com")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = ClientConfig::from_lookup(lookup_from(&[(ENV_API_URL, "ftp://x")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_timeout() {
        assert!(ClientConfig::from_lookup(lookup_from(&[(ENV_HTTP_TIMEOUT_SECS, "soon")])).is_err());
        assert!(ClientConfig::from_lookup(lookup_from(&[(ENV_HTTP_TIMEOUT_SECS, "0")])).is_err());
    }
}
