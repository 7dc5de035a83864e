use crate::errors::ApiError;
use crate::services::coolify_client::CoolifyClient;
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolHandler, ToolOutput};
use async_trait::async_trait;
use serde_json::Value;

pub const GITHUB_APP_SOURCE_TYPE: &str = "App\\Models\\GithubApp";
pub const APPLICATION_TOOLS: &[&str] = &["create_private_github_app_application"];

/// Application tools that need more than one upstream call.
pub struct ApplicationManager {
    logger: Logger,
    client: CoolifyClient,
    default_github_app: Option<String>,
}

fn app_reference(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Replaces `github_app_uuid` with the `source_id`/`source_type` pair the
/// API expects.
pub fn github_app_payload(args: &Value, app: &Value) -> Result<Value, ApiError> {
    let source_id = app
        .get("id")
        .cloned()
        .filter(|id| !id.is_null())
        .ok_or_else(|| ApiError::new("GitHub App has no numeric id").with_code("INVALID_GITHUB_APP"))?;
    let mut body = args.as_object().cloned().unwrap_or_default();
    body.remove("github_app_uuid");
    body.insert("source_id".to_string(), source_id);
    body.insert(
        "source_type".to_string(),
        Value::String(GITHUB_APP_SOURCE_TYPE.to_string()),
    );
    Ok(Value::Object(body))
}

impl ApplicationManager {
    pub fn new(logger: Logger, client: CoolifyClient, default_github_app: Option<String>) -> Self {
        Self {
            logger: logger.child("applications"),
            client,
            default_github_app,
        }
    }

    async fn create_private_github_app_application(&self, args: &Value) -> Result<ToolOutput, ApiError> {
        let reference = args
            .get("github_app_uuid")
            .and_then(app_reference)
            .or_else(|| self.default_github_app.clone())
            .ok_or_else(|| {
                ApiError::invalid_params(
                    "github_app_uuid is required (or set COOLIFY_GITHUB_APP_UUID)",
                )
            })?;
        let app = self
            .client
            .find_github_app(&reference)
            .await?
            .ok_or_else(|| {
                ApiError::not_found(format!("GitHub App not found with UUID: {}", reference))
            })?;
        let body = github_app_payload(args, &app)?;
        self.logger.debug(
            "Resolved GitHub App",
            Some(&serde_json::json!({"reference": reference, "source_id": body.get("source_id")})),
        );
        let created = self.client.post("/applications/public", &body).await?;
        Ok(ToolOutput::new(created).with_message("Application created from private GitHub App"))
    }
}

#[async_trait]
impl ToolHandler for ApplicationManager {
    async fn handle(&self, tool: &str, args: Value) -> Result<ToolOutput, ApiError> {
        match tool {
            "create_private_github_app_application" => {
                self.create_private_github_app_application(&args).await
            }
            _ => Err(ApiError::invalid_params(format!("Unknown tool: {}", tool))),
        }
    }
}
