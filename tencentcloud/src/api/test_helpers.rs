//! Test helpers for the Tencent Cloud API

use reconcile::NoopLimiter;
use std::sync::Arc;

use crate::config::ProviderConfig;

/// Client pointed at a mock server, without rate limiting
#[allow(dead_code)]
pub fn create_test_client(url: &str) -> super::Client {
    super::Client::with_limiter(&test_config(url), Arc::new(NoopLimiter)).unwrap()
}

pub fn test_config(url: &str) -> ProviderConfig {
    ProviderConfig {
        endpoint: url.to_string(),
        api_token: "test-token".to_string(),
        region: "ap-guangzhou".to_string(),
        insecure: true,
        request_timeout_secs: 5,
        ..ProviderConfig::default()
    }
}
