use crate::errors::ApiError;
use crate::services::coolify_client::CoolifyClient;
use crate::services::tool_executor::{ToolHandler, ToolOutput};
use crate::services::upsert::{BatchUpsertReconciler, EnvVarItem};
use crate::utils::template::encode_path_segment;
use async_trait::async_trait;
use serde_json::Value;

pub const ENV_TOOLS: &[&str] = &[
    "get_application_environment_variables",
    "update_application_environment_variables",
];

/// Environment variables of an application.
pub struct EnvManager {
    client: CoolifyClient,
    reconciler: BatchUpsertReconciler,
}

fn required_uuid(args: &Value) -> Result<String, ApiError> {
    args.get("uuid")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::invalid_params("uuid is required"))
}

impl EnvManager {
    pub fn new(client: CoolifyClient, reconciler: BatchUpsertReconciler) -> Self {
        Self { client, reconciler }
    }

    async fn list(&self, args: &Value) -> Result<ToolOutput, ApiError> {
        let uuid = required_uuid(args)?;
        let vars = self
            .client
            .get(&format!("/applications/{}/envs", encode_path_segment(&uuid)))
            .await?;
        let count = vars.as_array().map(|items| items.len());
        let output = ToolOutput::new(vars);
        Ok(match count {
            Some(count) => output.with_extra(serde_json::json!({ "count": count })),
            None => output,
        })
    }

    async fn update(&self, args: &Value) -> Result<ToolOutput, ApiError> {
        let uuid = required_uuid(args)?;
        match args.get("variables") {
            Some(Value::Array(items)) => {
                let report = self.reconciler.upsert_many(&uuid, items).await?;
                let failed = report.failures();
                let message = report.message.clone();
                let data = serde_json::to_value(&report)?;
                Ok(ToolOutput::new(data)
                    .with_message(message)
                    .with_extra(serde_json::json!({ "failed": failed })))
            }
            Some(single @ Value::Object(_)) => {
                let item: EnvVarItem = serde_json::from_value(single.clone())
                    .map_err(|err| ApiError::invalid_params(format!("Invalid variable: {}", err)))?;
                let (action, response) = self.reconciler.upsert_one(&uuid, &item).await?;
                Ok(ToolOutput::new(response).with_extra(serde_json::json!({
                    "key": item.key,
                    "action": action,
                })))
            }
            _ => Err(ApiError::invalid_params(
                "variables must be an array or an object",
            )),
        }
    }
}

#[async_trait]
impl ToolHandler for EnvManager {
    async fn handle(&self, tool: &str, args: Value) -> Result<ToolOutput, ApiError> {
        match tool {
            "get_application_environment_variables" => self.list(&args).await,
            "update_application_environment_variables" => self.update(&args).await,
            _ => Err(ApiError::invalid_params(format!("Unknown tool: {}", tool))),
        }
    }
}
