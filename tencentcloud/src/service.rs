//! Submit-then-wait orchestration on top of the API client
//!
//! A mutating call is submitted under the write retry policy, then the
//! resource is described on a fixed cadence until its family reports a
//! target state.

use reconcile::{
    retry, retry_classified, OperationContext, PollConfig, ResourceState, RetryError,
    RetryFailure, WaitError,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;

use crate::api::{Action, ApiError, Client, StatusLabel};
use crate::config::{ConfigError, ProviderConfig};
use crate::families::{FamilyError, FamilyRegistry, ResourceFamily};
use crate::taxonomy::ErrorTaxonomy;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unknown resource family {0}")]
    UnknownFamily(String),

    #[error(transparent)]
    Family(#[from] FamilyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create API client: {0}")]
    Client(#[source] ApiError),

    #[error("Submitting {action} failed: {source}")]
    Submit {
        action: String,
        #[source]
        source: RetryFailure<ApiError>,
    },

    #[error("Describing {id} failed: {source}")]
    Describe {
        id: String,
        #[source]
        source: RetryError<ApiError>,
    },

    #[error(transparent)]
    Wait(#[from] WaitError<ApiError>),

    #[error("{id} is still not readable after the last write: {source}")]
    ReadAfterWrite {
        id: String,
        #[source]
        source: RetryFailure<ApiError>,
    },

    #[error("Response has no resource id at {0}")]
    MissingId(String),
}

/// Where the id of the resource to wait for comes from
#[derive(Debug, Clone)]
pub enum IdSource {
    Known(String),
    /// JSON pointer into the submit response, e.g. `/FlowId`
    ResponsePointer(String),
}

impl IdSource {
    fn resolve(&self, response: &Value) -> Result<String, ServiceError> {
        match self {
            IdSource::Known(id) => Ok(id.clone()),
            IdSource::ResponsePointer(pointer) => response
                .pointer(pointer)
                .filter(|v| !v.is_null())
                .and_then(|v| serde_json::from_value::<StatusLabel>(v.clone()).ok())
                .map(StatusLabel::into_string)
                .ok_or_else(|| ServiceError::MissingId(pointer.clone())),
        }
    }
}

#[derive(Clone)]
pub struct StateService {
    client: Client,
    registry: Arc<FamilyRegistry>,
    config: ProviderConfig,
    poll_interval: Duration,
}

impl StateService {
    pub fn new(client: Client, registry: Arc<FamilyRegistry>, config: ProviderConfig) -> Self {
        let poll_interval = config.poll_interval();
        Self {
            client,
            registry,
            config,
            poll_interval,
        }
    }

    /// Client, built-in families and the families file named in `config`
    pub fn from_config(config: ProviderConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let client = Client::new(&config).map_err(ServiceError::Client)?;

        let registry = FamilyRegistry::with_overrides(config.families_file.as_deref())?;

        Ok(Self::new(client, Arc::new(registry), config))
    }

    /// Override the poll cadence, which otherwise comes in whole seconds
    /// from the configuration
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn registry(&self) -> &FamilyRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn family(&self, kind: &str) -> Result<Arc<ResourceFamily>, ServiceError> {
        self.registry
            .get(kind)
            .ok_or_else(|| ServiceError::UnknownFamily(kind.to_string()))
    }

    /// Send a mutating action, retrying transient failures for the write
    /// retry timeout
    pub async fn submit<T, B>(&self, action: &Action, body: &B) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let ctx = OperationContext::new(format!("{}.submit", action.action));
        let _elapsed = ctx.elapsed_guard();

        retry_classified(&self.config.write_policy(), || {
            self.client.call::<T, B>(action, body)
        })
        .instrument(ctx.span())
        .await
        .map_err(|source| ServiceError::Submit {
            action: action.to_string(),
            source,
        })
    }

    /// One describe call; `None` when the resource does not exist
    pub async fn describe_state(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<Option<ResourceState<Value>>, ServiceError> {
        let family = self.family(kind)?;
        let taxonomy = family.taxonomy()?;
        let body = family.describe_body(id)?;

        self.read_once(&family, &taxonomy, id, &body)
            .await
            .map_err(|source| ServiceError::Describe {
                id: id.to_string(),
                source,
            })
    }

    /// Wait until the resource reaches one of its family's target states
    pub async fn wait_for(&self, kind: &str, id: &str) -> Result<ResourceState<Value>, ServiceError> {
        let family = self.family(kind)?;
        let config = family
            .poll_config(&self.config)
            .interval(self.poll_interval);
        self.wait_with(&family, id, &config).await
    }

    /// Wait until describing the resource reports it gone
    pub async fn wait_until_absent(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<ResourceState<Value>, ServiceError> {
        let family = self.family(kind)?;
        let timeout = family.poll_config(&self.config).timeout;
        let config = PollConfig::new(Vec::<String>::new())
            .missing_is_target(true)
            .interval(self.poll_interval)
            .timeout(timeout);
        self.wait_with(&family, id, &config).await
    }

    /// Wait using an explicit poll configuration
    pub async fn wait_with(
        &self,
        family: &ResourceFamily,
        id: &str,
        config: &PollConfig,
    ) -> Result<ResourceState<Value>, ServiceError> {
        let taxonomy = family.taxonomy()?;
        let body = family.describe_body(id)?;

        let ctx = OperationContext::new(format!("{}.wait", family.kind));
        let _elapsed = ctx.elapsed_guard();

        let state = reconcile::wait_for(id, config, || {
            self.read_once(family, &taxonomy, id, &body)
        })
        .instrument(ctx.span())
        .await?;

        Ok(state)
    }

    /// Submit a mutating action, then wait for the resource it affects
    pub async fn submit_and_wait<B>(
        &self,
        kind: &str,
        action: &Action,
        body: &B,
        id: IdSource,
    ) -> Result<ResourceState<Value>, ServiceError>
    where
        B: Serialize + ?Sized,
    {
        // fail before submitting anything if the family is unknown
        self.family(kind)?;

        let response: Value = self.submit(action, body).await?;
        let id = id.resolve(&response)?;
        tracing::info!("{} accepted, waiting for {} {}", action, kind, id);

        self.wait_for(kind, &id).await
    }

    /// Read a resource right after writing it, treating "not found" as
    /// eventual consistency until the read retry timeout
    pub async fn read_after_write(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<ResourceState<Value>, ServiceError> {
        let family = self.family(kind)?;
        let taxonomy = family.taxonomy()?;
        let body = family.describe_body(id)?;

        let ctx = OperationContext::new(format!("{}.read", family.kind));
        let _elapsed = ctx.elapsed_guard();

        retry(&self.config.read_policy(), || async {
            match self.read_once(&family, &taxonomy, id, &body).await? {
                Some(state) => Ok(state),
                None => Err(RetryError::Retryable(ApiError::NotVisible(id.to_string()))),
            }
        })
        .instrument(ctx.span())
        .await
        .map_err(|source| ServiceError::ReadAfterWrite {
            id: id.to_string(),
            source,
        })
    }

    async fn read_once(
        &self,
        family: &ResourceFamily,
        taxonomy: &ErrorTaxonomy,
        id: &str,
        body: &Value,
    ) -> Result<Option<ResourceState<Value>>, RetryError<ApiError>> {
        match self.client.call::<Value, _>(&family.describe(), body).await {
            Ok(response) => family.extract_state(id, &response).map_err(RetryError::Fatal),
            Err(e) if taxonomy.is_not_found(&e) => {
                tracing::debug!("{} {} not found: {}", family.kind, id, e);
                Ok(None)
            }
            Err(e) => Err(taxonomy.to_retry_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::Server;
    use serde_json::json;

    fn service(url: &str) -> StateService {
        let config = crate::api::test_helpers::test_config(url);
        StateService::new(
            create_test_client(url),
            Arc::new(FamilyRegistry::builtin()),
            config,
        )
        .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn id_source_resolves_strings_and_numbers() {
        let response = json!({"FlowId": 1234, "InstanceIds": ["ins-9"], "Empty": null});

        assert_eq!(
            IdSource::ResponsePointer("/FlowId".to_string())
                .resolve(&response)
                .unwrap(),
            "1234"
        );
        assert_eq!(
            IdSource::ResponsePointer("/InstanceIds/0".to_string())
                .resolve(&response)
                .unwrap(),
            "ins-9"
        );
        assert!(matches!(
            IdSource::ResponsePointer("/Empty".to_string()).resolve(&response),
            Err(ServiceError::MissingId(_))
        ));
        assert_eq!(
            IdSource::Known("pg-1".to_string()).resolve(&response).unwrap(),
            "pg-1"
        );
    }

    #[tokio::test]
    async fn describe_state_treats_not_found_code_as_absent() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeDBInstances")
            .with_body(
                r#"{"Response":{"Error":{"Code":"ResourceNotFound.InstanceNotFoundError","Message":"gone"},"RequestId":"r1"}}"#,
            )
            .create_async()
            .await;

        let service = service(&server.url());
        let state = service
            .describe_state("postgresql_instance", "postgres-1")
            .await
            .unwrap();

        assert!(state.is_none());
    }

    #[tokio::test]
    async fn describe_state_reports_fatal_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(
                r#"{"Response":{"Error":{"Code":"UnauthorizedOperation","Message":"no"},"RequestId":"r2"}}"#,
            )
            .create_async()
            .await;

        let service = service(&server.url());
        match service.describe_state("cvm_instance", "ins-1").await {
            Err(ServiceError::Describe { source, .. }) => assert!(!source.is_retryable()),
            other => panic!("expected describe failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_family_is_rejected_before_any_call() {
        let server = Server::new_async().await;
        let service = service(&server.url());

        let result = service
            .submit_and_wait(
                "no_such_family",
                &Action::new("cvm", "2017-03-12", "RunInstances"),
                &json!({}),
                IdSource::Known("ins-1".to_string()),
            )
            .await;

        assert!(matches!(result, Err(ServiceError::UnknownFamily(_))));
        assert_eq!(service.client().transport_stats().await.total_requests, 0);
    }

    #[tokio::test]
    async fn wait_until_absent_returns_once_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(r#"{"Response":{"TotalCount":0,"InstanceSet":[],"RequestId":"r3"}}"#)
            .create_async()
            .await;

        let service = service(&server.url());
        let state = service
            .wait_until_absent("cvm_instance", "ins-1")
            .await
            .unwrap();

        assert_eq!(state.resource_id, "ins-1");
        assert!(state.detail.is_none());
    }
}
