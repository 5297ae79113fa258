use reconcile::{RateLimiter, TokenBucketLimiter};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::common::{Action, ApiResponse, ResponseMeta};
use super::error::ApiError;
use super::transport::{RequestOutcome, TransportConfig, TransportManager, TransportStats};
use crate::config::ProviderConfig;

/// Placeholder in the endpoint replaced by the product name, so the default
/// endpoint resolves to `https://cvm.tencentcloudapi.com` for CVM actions
pub const SERVICE_PLACEHOLDER: &str = "{service}";

/// Tencent Cloud API client
///
/// Each [`Client::call`] is exactly one HTTP exchange. Retrying and waiting
/// are left to the `reconcile` engine.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    endpoint: String,
    region: String,
    auth_header: String,
    limiter: Arc<dyn RateLimiter>,
    transport: TransportManager,
}

impl Client {
    /// Create a client limited to `api_rate_limit` calls per second per action
    pub fn new(config: &ProviderConfig) -> Result<Self, ApiError> {
        let limiter = Arc::new(TokenBucketLimiter::new(config.api_rate_limit));
        Self::with_limiter(config, limiter)
    }

    pub fn with_limiter(
        config: &ProviderConfig,
        limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self, ApiError> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        url::Url::parse(&endpoint.replace(SERVICE_PLACEHOLDER, "cvm"))
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

        let transport = TransportManager::new(TransportConfig::from(config));
        let http_client = transport.http_client()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                endpoint,
                region: config.region.clone(),
                auth_header: format!("Bearer {}", config.api_token),
                limiter,
                transport,
            }),
        })
    }

    pub fn region(&self) -> &str {
        &self.inner.region
    }

    /// URL the action is posted to
    pub fn endpoint_for(&self, service: &str) -> String {
        format!(
            "{}/",
            self.inner.endpoint.replace(SERVICE_PLACEHOLDER, service)
        )
    }

    /// Send one action and decode its `Response` payload
    pub async fn call<T, B>(&self, action: &Action, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.inner.limiter.acquire(&action.action).await;

        let url = self.endpoint_for(&action.service);
        tracing::debug!("POST {} to {}", action, url);

        let sent = self
            .inner
            .http_client
            .post(&url)
            .header(AUTHORIZATION, &self.inner.auth_header)
            .header(CONTENT_TYPE, "application/json")
            .header("X-TC-Action", &action.action)
            .header("X-TC-Version", &action.version)
            .header("X-TC-Region", &self.inner.region)
            .header("X-TC-Service", &action.service)
            .json(body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.inner
                    .transport
                    .record_request(RequestOutcome::Failed)
                    .await;
                return Err(self.map_transport_error(e));
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            self.inner
                .transport
                .record_request(RequestOutcome::Throttled)
                .await;
            return Err(ApiError::RateLimited);
        }
        if status.is_server_error() {
            self.inner
                .transport
                .record_request(RequestOutcome::Failed)
                .await;
            return Err(ApiError::ServiceUnavailable);
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                self.inner
                    .transport
                    .record_request(RequestOutcome::Failed)
                    .await;
                return Err(self.map_transport_error(e));
            }
        };
        tracing::debug!("{} response body: {}", action, text);

        let result = parse_envelope(status, &text);
        let outcome = match &result {
            Ok(_) => RequestOutcome::Success,
            Err(e) if e.has_code("RequestLimitExceeded") => RequestOutcome::Throttled,
            Err(_) => RequestOutcome::Failed,
        };
        self.inner.transport.record_request(outcome).await;

        if let Err(e) = &result {
            tracing::debug!("{} failed: {}", action, e);
        }
        result
    }

    /// Request statistics for this client
    pub async fn transport_stats(&self) -> TransportStats {
        self.inner.transport.stats().await
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.inner.transport.config().request_timeout.as_secs())
        } else if e.is_connect() {
            ApiError::ServiceUnavailable
        } else {
            ApiError::Request(e)
        }
    }
}

/// Decode `{"Response": {...}}`, surfacing an embedded `Error` block first
fn parse_envelope<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T, ApiError> {
    if let Ok(envelope) = serde_json::from_str::<ApiResponse<ResponseMeta>>(text) {
        let meta = envelope.response;
        if let Some(error) = meta.error {
            return Err(ApiError::Service {
                code: error.code,
                message: error.message,
                request_id: meta.request_id,
            });
        }
    }

    if !status.is_success() {
        return Err(ApiError::Http {
            status: status.as_u16(),
            message: text.to_string(),
        });
    }

    serde_json::from_str::<ApiResponse<T>>(text)
        .map(|wrapper| wrapper.response)
        .map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(e.to_string())
        })
}
