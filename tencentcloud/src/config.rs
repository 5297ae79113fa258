//! Provider configuration loaded from `TENCENTCLOUD_*` environment variables

use reconcile::{RetryPolicy, DEFAULT_ACTION_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::api::client::SERVICE_PLACEHOLDER;

pub const DEFAULT_ENDPOINT: &str = "https://{service}.tencentcloudapi.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Invalid endpoint {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_token: String,
    pub region: String,
    pub insecure: bool,
    pub read_retry_timeout_secs: u64,
    pub write_retry_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub api_rate_limit: u32,
    pub request_timeout_secs: u64,
    pub families_file: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_token: String::new(),
            region: String::new(),
            insecure: false,
            read_retry_timeout_secs: reconcile::READ_RETRY_TIMEOUT.as_secs(),
            write_retry_timeout_secs: reconcile::WRITE_RETRY_TIMEOUT.as_secs(),
            poll_interval_secs: 1,
            api_rate_limit: DEFAULT_ACTION_LIMIT,
            request_timeout_secs: 30,
            families_file: None,
        }
    }
}

impl ProviderConfig {
    /// Read the configuration from the environment and validate it
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(endpoint) = env_var("TENCENTCLOUD_ENDPOINT") {
            config.endpoint = endpoint;
        }
        config.api_token =
            env_var("TENCENTCLOUD_API_TOKEN").ok_or(ConfigError::Missing("TENCENTCLOUD_API_TOKEN"))?;
        config.region =
            env_var("TENCENTCLOUD_REGION").ok_or(ConfigError::Missing("TENCENTCLOUD_REGION"))?;

        if let Some(insecure) = parse_var::<bool>("TENCENTCLOUD_INSECURE")? {
            config.insecure = insecure;
        }
        if let Some(secs) = parse_var("TENCENTCLOUD_READ_RETRY_TIMEOUT")? {
            config.read_retry_timeout_secs = secs;
        }
        if let Some(secs) = parse_var("TENCENTCLOUD_WRITE_RETRY_TIMEOUT")? {
            config.write_retry_timeout_secs = secs;
        }
        if let Some(secs) = parse_var("TENCENTCLOUD_POLL_INTERVAL")? {
            config.poll_interval_secs = secs;
        }
        if let Some(limit) = parse_var("TENCENTCLOUD_API_RATE_LIMIT")? {
            config.api_rate_limit = limit;
        }
        if let Some(secs) = parse_var("TENCENTCLOUD_REQUEST_TIMEOUT")? {
            config.request_timeout_secs = secs;
        }
        config.families_file = Self::families_file_from_env();

        config.validate()?;
        Ok(config)
    }

    /// `TENCENTCLOUD_FAMILIES_FILE`, readable without any credentials set
    pub fn families_file_from_env() -> Option<PathBuf> {
        env_var("TENCENTCLOUD_FAMILIES_FILE").map(PathBuf::from)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let resolved = self.endpoint.replace(SERVICE_PLACEHOLDER, "cvm");
        let url = url::Url::parse(&resolved).map_err(|e| ConfigError::Endpoint {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Endpoint {
                endpoint: self.endpoint.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        for (name, value) in [
            ("read_retry_timeout_secs", self.read_retry_timeout_secs),
            ("write_retry_timeout_secs", self.write_retry_timeout_secs),
            ("poll_interval_secs", self.poll_interval_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("api_rate_limit", u64::from(self.api_rate_limit)),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_retry_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_retry_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Retry policy for reads and read-after-write checks
    pub fn read_policy(&self) -> RetryPolicy {
        RetryPolicy::with_timeout(self.read_timeout())
    }

    /// Retry policy for create, update and delete submissions
    pub fn write_policy(&self) -> RetryPolicy {
        RetryPolicy::with_timeout(self.write_timeout())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
