use crate::errors::ApiError;
use crate::services::coolify_client::CoolifyClient;
use crate::services::logger::Logger;
use crate::utils::template::encode_path_segment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Upstream wording that turns a failed update into a create.
pub const NOT_FOUND_MARKER: &str = "not found";
pub const BATCH_COMPLETED_MESSAGE: &str = "Batch operation completed";

/// Write side of a resource's environment variables.
#[async_trait]
pub trait EnvVarStore: Send + Sync {
    async fn update_env(&self, resource_id: &str, payload: &Value) -> Result<Value, ApiError>;
    async fn create_env(&self, resource_id: &str, payload: &Value) -> Result<Value, ApiError>;
}

#[async_trait]
impl EnvVarStore for CoolifyClient {
    async fn update_env(&self, resource_id: &str, payload: &Value) -> Result<Value, ApiError> {
        let path = format!("/applications/{}/envs", encode_path_segment(resource_id));
        self.patch(&path, payload).await
    }

    async fn create_env(&self, resource_id: &str, payload: &Value) -> Result<Value, ApiError> {
        let path = format!("/applications/{}/envs", encode_path_segment(resource_id));
        self.post(&path, payload).await
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnvVarItem {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub is_preview: Option<bool>,
    #[serde(default)]
    pub is_build_time: Option<bool>,
    #[serde(default)]
    pub is_literal: Option<bool>,
}

impl EnvVarItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_preview: None,
            is_build_time: None,
            is_literal: None,
        }
    }

    /// Request body; flags are only sent when the caller set them.
    pub fn payload(&self) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("key".to_string(), Value::String(self.key.clone()));
        body.insert("value".to_string(), Value::String(self.value.clone()));
        for (name, flag) in [
            ("is_preview", self.is_preview),
            ("is_build_time", self.is_build_time),
            ("is_literal", self.is_literal),
        ] {
            if let Some(flag) = flag {
                body.insert(name.to_string(), Value::Bool(flag));
            }
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Updated,
    Created,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpsertStatus {
    Applied { action: UpsertAction, response: Value },
    Failed { error: String },
}

/// The fate of one item in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertOutcome {
    pub key: String,
    #[serde(flatten)]
    pub status: UpsertStatus,
}

impl UpsertOutcome {
    pub fn action(&self) -> Option<UpsertAction> {
        match &self.status {
            UpsertStatus::Applied { action, .. } => Some(*action),
            UpsertStatus::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            UpsertStatus::Failed { error } => Some(error),
            UpsertStatus::Applied { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchUpsertReport {
    pub message: String,
    pub results: Vec<UpsertOutcome>,
}

impl BatchUpsertReport {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.error().is_some()).count()
    }
}

fn is_not_found(err: &ApiError) -> bool {
    err.message().contains(NOT_FOUND_MARKER)
}

/// Only an empty key is refused locally; naming rules belong to upstream.
pub fn validate_env_key(key: &str) -> Result<(), ApiError> {
    if key.trim().is_empty() {
        return Err(ApiError::invalid_params(
            "Environment variable key must not be empty",
        ));
    }
    Ok(())
}

/// Update-then-create reconciliation of environment variables.
#[derive(Clone)]
pub struct BatchUpsertReconciler {
    logger: Logger,
    store: Arc<dyn EnvVarStore>,
}

impl BatchUpsertReconciler {
    pub fn new(logger: Logger, store: Arc<dyn EnvVarStore>) -> Self {
        Self {
            logger: logger.child("upsert"),
            store,
        }
    }

    /// Single-item path: a failure other than the not-found fallback is
    /// returned to the caller.
    pub async fn upsert_one(
        &self,
        resource_id: &str,
        item: &EnvVarItem,
    ) -> Result<(UpsertAction, Value), ApiError> {
        validate_env_key(&item.key)?;
        let payload = item.payload();
        match self.store.update_env(resource_id, &payload).await {
            Ok(response) => Ok((UpsertAction::Updated, response)),
            Err(err) if is_not_found(&err) => {
                self.logger.debug(
                    "Update reported not found, creating",
                    Some(&serde_json::json!({"key": item.key})),
                );
                let response = self.store.create_env(resource_id, &payload).await?;
                Ok((UpsertAction::Created, response))
            }
            Err(err) => Err(err),
        }
    }

    /// Processes `items` strictly in order. Per-item failures are recorded in
    /// the report; only a missing `resource_id` fails the whole call.
    pub async fn upsert_many(
        &self,
        resource_id: &str,
        items: &[Value],
    ) -> Result<BatchUpsertReport, ApiError> {
        if resource_id.trim().is_empty() {
            return Err(ApiError::invalid_params("uuid is required"));
        }
        let mut results = Vec::with_capacity(items.len());
        for raw in items {
            let fallback_key = raw
                .get("key")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let outcome = match serde_json::from_value::<EnvVarItem>(raw.clone()) {
                Ok(item) => match self.upsert_one(resource_id, &item).await {
                    Ok((action, response)) => UpsertOutcome {
                        key: item.key,
                        status: UpsertStatus::Applied { action, response },
                    },
                    Err(err) => UpsertOutcome {
                        key: item.key,
                        status: UpsertStatus::Failed {
                            error: err.message().to_string(),
                        },
                    },
                },
                Err(err) => UpsertOutcome {
                    key: fallback_key,
                    status: UpsertStatus::Failed {
                        error: format!("Invalid environment variable: {}", err),
                    },
                },
            };
            if let Some(error) = outcome.error() {
                self.logger.warn(
                    "Environment variable upsert failed",
                    Some(&serde_json::json!({"key": outcome.key, "error": error})),
                );
            }
            results.push(outcome);
        }
        let report = BatchUpsertReport {
            message: BATCH_COMPLETED_MESSAGE.to_string(),
            results,
        };
        self.logger.info(
            "Batch upsert finished",
            Some(&serde_json::json!({
                "resource": resource_id,
                "total": report.results.len(),
                "failed": report.failures(),
            })),
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_omits_unset_flags() {
        let mut item = EnvVarItem::new("API_URL", "https://x");
        assert_eq!(item.payload(), json!({"key": "API_URL", "value": "https://x"}));
        item.is_build_time = Some(false);
        assert_eq!(
            item.payload(),
            json!({"key": "API_URL", "value": "https://x", "is_build_time": false})
        );
    }

    #[test]
    fn outcomes_serialize_flat() {
        let ok = UpsertOutcome {
            key: "A".to_string(),
            status: UpsertStatus::Applied {
                action: UpsertAction::Created,
                response: json!({"uuid": "e1"}),
            },
        };
        assert_eq!(
            serde_json::to_value(&ok).expect("serialize"),
            json!({"key": "A", "action": "created", "response": {"uuid": "e1"}})
        );
        let failed = UpsertOutcome {
            key: "B".to_string(),
            status: UpsertStatus::Failed {
                error: "boom".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&failed).expect("serialize"),
            json!({"key": "B", "error": "boom"})
        );
    }

    #[test]
    fn only_empty_keys_are_refused() {
        assert!(validate_env_key("DATABASE_URL").is_ok());
        assert!(validate_env_key("app.name").is_ok());
        assert!(validate_env_key("my-var").is_ok());
        assert!(validate_env_key("  ").is_err());
    }

    #[test]
    fn not_found_match_is_case_sensitive() {
        assert!(is_not_found(&ApiError::new("Environment variable not found.")));
        assert!(!is_not_found(&ApiError::new("Not Found")));
    }
}
