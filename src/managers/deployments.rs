use crate::errors::ApiError;
use crate::services::coolify_client::CoolifyClient;
use crate::services::tool_executor::{ToolHandler, ToolOutput};
use crate::utils::template::{append_query, encode_path_segment};
use crate::utils::text::truncate_chars;
use async_trait::async_trait;
use serde_json::{json, Value};

pub const DEPLOYMENT_TOOLS: &[&str] = &["get_deployments"];

const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 50;
const COMMIT_SHA_CHARS: usize = 8;
const PAGING_HINT: &str = "Use skip and limit parameters for pagination. For full deployment details, use get_deployment with specific UUID.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentPage {
    pub skip: u64,
    pub limit: u64,
}

impl DeploymentPage {
    /// `limit` falls back to 10 when absent or zero and is capped at 50.
    pub fn from_args(args: &Value) -> Self {
        let skip = args.get("skip").and_then(Value::as_u64).unwrap_or(0);
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Self { skip, limit }
    }

    pub fn pagination(&self, count: usize) -> Value {
        json!({
            "skip": self.skip,
            "limit": self.limit,
            "count": count,
            "hasMore": count as u64 == self.limit,
            "message": format!(
                "Showing {} deployments (skip: {}, limit: {})",
                count, self.skip, self.limit
            ),
        })
    }
}

/// The handful of fields worth showing per deployment.
pub fn summarize_deployment(deployment: &Value) -> Value {
    let field = |key: &str| deployment.get(key).cloned().unwrap_or(Value::Null);
    let commit_sha = deployment
        .get("git_commit_sha")
        .and_then(Value::as_str)
        .map(|sha| Value::String(truncate_chars(sha, COMMIT_SHA_CHARS).to_string()))
        .unwrap_or(Value::Null);
    let message = deployment
        .get("message")
        .filter(|m| m.as_str().map(|s| !s.is_empty()).unwrap_or(!m.is_null()))
        .or_else(|| deployment.get("description"))
        .cloned()
        .unwrap_or(Value::Null);
    json!({
        "id": field("id"),
        "uuid": field("uuid"),
        "status": field("status"),
        "created_at": field("created_at"),
        "updated_at": field("updated_at"),
        "commit_sha": commit_sha,
        "message": message,
    })
}

pub struct DeploymentManager {
    client: CoolifyClient,
}

impl DeploymentManager {
    pub fn new(client: CoolifyClient) -> Self {
        Self { client }
    }

    async fn get_deployments(&self, args: &Value) -> Result<ToolOutput, ApiError> {
        let application = args
            .get("application_uuid")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|uuid| !uuid.is_empty())
            .ok_or_else(|| ApiError::invalid_params("application_uuid is required"))?;
        let page = DeploymentPage::from_args(args);
        let path = append_query(
            &format!("/deployments/applications/{}", encode_path_segment(application)),
            &[
                ("skip".to_string(), page.skip.to_string()),
                ("take".to_string(), page.limit.to_string()),
            ],
        );
        let response = self.client.get(&path).await?;
        let summaries: Vec<Value> = response
            .get("deployments")
            .and_then(Value::as_array)
            .or_else(|| response.as_array())
            .map(|items| items.iter().map(summarize_deployment).collect())
            .unwrap_or_default();
        let pagination = page.pagination(summaries.len());
        Ok(ToolOutput::new(Value::Array(summaries))
            .with_extra(json!({"pagination": pagination, "hint": PAGING_HINT})))
    }
}

#[async_trait]
impl ToolHandler for DeploymentManager {
    async fn handle(&self, tool: &str, args: Value) -> Result<ToolOutput, ApiError> {
        match tool {
            "get_deployments" => self.get_deployments(&args).await,
            _ => Err(ApiError::invalid_params(format!("Unknown tool: {}", tool))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(
            DeploymentPage::from_args(&json!({})),
            DeploymentPage { skip: 0, limit: 10 }
        );
        assert_eq!(
            DeploymentPage::from_args(&json!({"skip": 20, "limit": 500})),
            DeploymentPage { skip: 20, limit: 50 }
        );
        let pagination = DeploymentPage { skip: 0, limit: 2 }.pagination(2);
        assert_eq!(pagination["hasMore"], json!(true));
    }

    #[test]
    fn summaries_shorten_the_commit() {
        let summary = summarize_deployment(&json!({
            "id": 9,
            "uuid": "d9",
            "status": "finished",
            "git_commit_sha": "0123456789abcdef",
            "message": "",
            "description": "manual",
            "logs": "very long",
        }));
        assert_eq!(summary["commit_sha"], json!("01234567"));
        assert_eq!(summary["message"], json!("manual"));
        assert!(summary.get("logs").is_none());
    }
}
