//! HTTP transport for API actions: reqwest client settings and request accounting

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::ProviderConfig;

const USER_AGENT: &str = concat!("tencentcloud-wait/", env!("CARGO_PKG_VERSION"));

/// reqwest settings derived from the provider configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub idle_per_host: usize,
    pub idle_timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for TransportConfig {
    fn from(config: &ProviderConfig) -> Self {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        Self {
            request_timeout,
            // connecting never gets more than a third of the request budget
            connect_timeout: std::cmp::min(Duration::from_secs(10), request_timeout / 3),
            idle_per_host: config.api_rate_limit as usize,
            idle_timeout: Duration::from_secs(90),
            tcp_keepalive: Some(Duration::from_secs(30)),
            accept_invalid_certs: config.insecure,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct TransportStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub throttled_requests: u64,
    pub last_request: Option<Instant>,
}

/// Outcome of one HTTP exchange, as far as the transport is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Throttled,
    Failed,
}

pub struct TransportManager {
    config: TransportConfig,
    stats: Arc<RwLock<TransportStats>>,
}

impl TransportManager {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            stats: Arc::new(RwLock::new(TransportStats::default())),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub async fn record_request(&self, outcome: RequestOutcome) {
        let mut stats = self.stats.write().await;
        stats.total_requests += 1;
        match outcome {
            RequestOutcome::Success => {}
            RequestOutcome::Throttled => {
                stats.throttled_requests += 1;
                stats.failed_requests += 1;
            }
            RequestOutcome::Failed => stats.failed_requests += 1,
        }
        stats.last_request = Some(Instant::now());
    }

    pub async fn stats(&self) -> TransportStats {
        self.stats.read().await.clone()
    }

    /// reqwest client shared by every action sent through this transport
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let config = &self.config;
        if config.accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled");
        }

        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.idle_timeout)
            .pool_max_idle_per_host(config.idle_per_host)
            .tcp_keepalive(config.tcp_keepalive)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_follows_provider_config() {
        let config = TransportConfig::from(&ProviderConfig {
            request_timeout_secs: 6,
            api_rate_limit: 5,
            insecure: true,
            ..ProviderConfig::default()
        });

        assert_eq!(config.request_timeout, Duration::from_secs(6));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.idle_per_host, 5);
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn default_transport_uses_default_provider_settings() {
        let config = TransportConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.idle_per_host, 20);
        assert!(!config.accept_invalid_certs);
    }

    #[tokio::test]
    async fn records_outcomes() {
        let manager = TransportManager::new(TransportConfig::default());
        assert_eq!(manager.stats().await.total_requests, 0);

        manager.record_request(RequestOutcome::Success).await;
        manager.record_request(RequestOutcome::Throttled).await;
        manager.record_request(RequestOutcome::Failed).await;

        let stats = manager.stats().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.failed_requests, 2);
        assert_eq!(stats.throttled_requests, 1);
        assert!(stats.last_request.is_some());
    }

    #[test]
    fn builds_http_client() {
        let manager = TransportManager::new(TransportConfig::default());
        assert!(manager.http_client().is_ok());
    }
}
