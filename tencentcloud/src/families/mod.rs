//! Resource families: how to describe one kind of resource and read its status
//!
//! Every product reports progress differently. A family records the describe
//! action, where the status sits in the response, and which status values
//! mean pending, done or failed. Nothing here assumes a shared status enum.

mod builtin;

use reconcile::{PollConfig, ResourceState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::api::{Action, ApiError, StatusLabel};
use crate::config::ProviderConfig;
use crate::taxonomy::ErrorTaxonomy;

const ID_PLACEHOLDER: &str = "{id}";
const INT_ID_PLACEHOLDER: &str = "{id:int}";

#[derive(Debug, Error)]
pub enum FamilyError {
    #[error("Invalid family {kind}: {reason}")]
    Invalid { kind: String, reason: String },

    #[error("Invalid error pattern in family {kind}: {source}")]
    Pattern {
        kind: String,
        #[source]
        source: regex::Error,
    },

    #[error("Resource id {id} of family {kind} must be an integer")]
    InvalidId { kind: String, id: String },

    #[error("Failed to read families file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse families: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_timeout_factor() -> u32 {
    1
}

/// Describe action and status vocabulary of one resource kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFamily {
    pub kind: String,
    pub service: String,
    pub version: String,
    pub describe_action: String,
    /// Request body; `"{id}"` is replaced by the resource id, `"{id:int}"`
    /// by the id as a JSON number
    pub request: Value,
    /// JSON pointer to the status inside `Response`
    pub status_pointer: String,
    /// JSON pointer to the payload kept as state detail; the whole response
    /// when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_pointer: Option<String>,
    #[serde(default)]
    pub pending: Vec<String>,
    pub target: Vec<String>,
    #[serde(default)]
    pub failure: Vec<String>,
    #[serde(default)]
    pub not_found_codes: Vec<String>,
    /// Extra retryable error code patterns (regex)
    #[serde(default)]
    pub retryable_codes: Vec<String>,
    /// Wait timeout as a multiple of the read retry timeout
    #[serde(default = "default_timeout_factor")]
    pub timeout_factor: u32,
}

impl ResourceFamily {
    pub fn describe(&self) -> Action {
        Action::new(&self.service, &self.version, &self.describe_action)
    }

    /// Describe request body for one resource
    pub fn describe_body(&self, id: &str) -> Result<Value, FamilyError> {
        self.substitute(&self.request, id)
    }

    fn substitute(&self, template: &Value, id: &str) -> Result<Value, FamilyError> {
        Ok(match template {
            Value::String(s) if s == INT_ID_PLACEHOLDER => {
                let n: i64 = id.parse().map_err(|_| FamilyError::InvalidId {
                    kind: self.kind.clone(),
                    id: id.to_string(),
                })?;
                Value::from(n)
            }
            Value::String(s) => Value::String(s.replace(ID_PLACEHOLDER, id)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.substitute(item, id))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.substitute(value, id)?);
                }
                Value::Object(out)
            }
            other => other.clone(),
        })
    }

    /// Status of the resource in a describe response
    ///
    /// An empty result set or a null status means the resource is absent.
    /// A response without the expected field is a parse error.
    pub fn extract_state(
        &self,
        id: &str,
        response: &Value,
    ) -> Result<Option<ResourceState<Value>>, ApiError> {
        let Some(status) = walk(response, &self.status_pointer)? else {
            return Ok(None);
        };

        let label: StatusLabel = serde_json::from_value(status.clone()).map_err(|e| {
            ApiError::ParseError(format!(
                "{} status at {} is not a label: {}",
                self.kind, self.status_pointer, e
            ))
        })?;

        let detail = match &self.detail_pointer {
            Some(pointer) => response.pointer(pointer).cloned().unwrap_or(Value::Null),
            None => response.clone(),
        };

        Ok(Some(
            ResourceState::new(id, label.into_string()).with_detail(detail),
        ))
    }

    pub fn poll_config(&self, config: &ProviderConfig) -> PollConfig {
        PollConfig::new(self.target.iter().cloned())
            .pending(self.pending.iter().cloned())
            .failure(self.failure.iter().cloned())
            .interval(config.poll_interval())
            .timeout(config.read_timeout().saturating_mul(self.timeout_factor.max(1)))
    }

    pub fn taxonomy(&self) -> Result<ErrorTaxonomy, FamilyError> {
        ErrorTaxonomy::new(
            self.retryable_codes.as_slice(),
            self.not_found_codes.as_slice(),
        )
        .map_err(|source| FamilyError::Pattern {
            kind: self.kind.clone(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), FamilyError> {
        let invalid = |reason: String| FamilyError::Invalid {
            kind: self.kind.clone(),
            reason,
        };

        if self.kind.is_empty() {
            return Err(invalid("kind must not be empty".to_string()));
        }
        if self.service.is_empty() || self.version.is_empty() || self.describe_action.is_empty()
        {
            return Err(invalid("service, version and describe_action are required".to_string()));
        }
        if !self.status_pointer.starts_with('/') {
            return Err(invalid(format!(
                "status_pointer {} must start with '/'",
                self.status_pointer
            )));
        }
        PollConfig::new(self.target.iter().cloned())
            .pending(self.pending.iter().cloned())
            .failure(self.failure.iter().cloned())
            .validate()
            .map_err(invalid)?;
        self.taxonomy()?;
        Ok(())
    }
}

/// Follow a JSON pointer; `None` when an array index or a null runs out
fn walk<'a>(root: &'a Value, pointer: &str) -> Result<Option<&'a Value>, ApiError> {
    let mut current = root;
    for raw in pointer.split('/').skip(1) {
        let token = raw.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Null => return Ok(None),
            Value::Array(items) => match token.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(item) => item,
                None => return Ok(None),
            },
            Value::Object(map) => match map.get(&token) {
                Some(value) => value,
                None => {
                    return Err(ApiError::ParseError(format!(
                        "response has no field {} (looking up {})",
                        token, pointer
                    )))
                }
            },
            _ => {
                return Err(ApiError::ParseError(format!(
                    "cannot descend into scalar at {} (looking up {})",
                    token, pointer
                )))
            }
        };
    }

    Ok(if current.is_null() { None } else { Some(current) })
}

/// Families by kind
#[derive(Debug, Clone, Default)]
pub struct FamilyRegistry {
    families: BTreeMap<String, Arc<ResourceFamily>>,
}

impl FamilyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in families
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for family in builtin::families() {
            registry
                .families
                .insert(family.kind.clone(), Arc::new(family));
        }
        registry
    }

    /// Built-in families plus any overrides from a JSON file
    pub fn with_overrides(path: Option<&Path>) -> Result<Self, FamilyError> {
        let mut registry = Self::builtin();
        if let Some(path) = path {
            registry.load_file(path)?;
        }
        Ok(registry)
    }

    /// Add a family, replacing any family of the same kind
    pub fn register(&mut self, family: ResourceFamily) -> Result<(), FamilyError> {
        family.validate()?;
        if self.families.contains_key(&family.kind) {
            tracing::info!("Overriding resource family {}", family.kind);
        }
        self.families
            .insert(family.kind.clone(), Arc::new(family));
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<Arc<ResourceFamily>> {
        self.families.get(kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    /// Register every family in a JSON array
    pub fn extend_from_json(&mut self, json: &str) -> Result<usize, FamilyError> {
        let families: Vec<ResourceFamily> = serde_json::from_str(json)?;
        let count = families.len();
        for family in families {
            self.register(family)?;
        }
        Ok(count)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<usize, FamilyError> {
        let json = std::fs::read_to_string(path)?;
        let count = self.extend_from_json(&json)?;
        tracing::debug!("Loaded {} resource families from {}", count, path.display());
        Ok(count)
    }
}
