use crate::errors::ApiError;
use crate::services::coolify_client::CoolifyClient;
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolHandler, ToolOutput};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

pub const STACK_TOOLS: &[&str] = &["create_fullstack_project", "deploy_infrastructure_stack"];

const DEFAULT_PROJECT_DESCRIPTION: &str = "Full-Stack Application Deployment";

/// One service of the infrastructure stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackComponent {
    pub flag: &'static str,
    pub service_type: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const STACK_COMPONENTS: &[StackComponent] = &[
    StackComponent {
        flag: "include_postgres",
        service_type: "postgresql",
        name: "app-postgres",
        description: "PostgreSQL Database",
    },
    StackComponent {
        flag: "include_redis",
        service_type: "redis",
        name: "app-redis",
        description: "Redis Cache",
    },
    StackComponent {
        flag: "include_minio",
        service_type: "minio",
        name: "app-minio",
        description: "Object Storage",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StackStatus {
    Deployed,
    Failed,
}

/// Services created so far; a failure stops the stack but keeps the list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackReport {
    pub project_uuid: String,
    pub services: Vec<String>,
    pub status: StackStatus,
    pub message: String,
}

/// Components switched on by `args`; every flag defaults to true.
pub fn selected_components(args: &Value) -> Vec<&'static StackComponent> {
    STACK_COMPONENTS
        .iter()
        .filter(|component| {
            args.get(component.flag)
                .and_then(Value::as_bool)
                .unwrap_or(true)
        })
        .collect()
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ApiError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::invalid_params(format!("{} is required", key)))
}

pub struct StackManager {
    logger: Logger,
    client: CoolifyClient,
}

impl StackManager {
    pub fn new(logger: Logger, client: CoolifyClient) -> Self {
        Self {
            logger: logger.child("stacks"),
            client,
        }
    }

    async fn create_fullstack_project(&self, args: &Value) -> Result<ToolOutput, ApiError> {
        let name = required_str(args, "name")?;
        let description = args
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty());
        let project = self
            .client
            .post(
                "/projects",
                &json!({
                    "name": name,
                    "description": description.unwrap_or(DEFAULT_PROJECT_DESCRIPTION),
                }),
            )
            .await?;
        Ok(ToolOutput::new(json!({
            "project_uuid": project.get("uuid").cloned().unwrap_or(Value::Null),
            "name": name,
            "description": description,
            "services": [],
            "status": "created",
        })))
    }

    /// Creates the selected services one after another. An upstream failure
    /// ends the run with `status: failed` instead of an error envelope.
    pub async fn deploy_infrastructure_stack(&self, args: &Value) -> Result<StackReport, ApiError> {
        let project_uuid = required_str(args, "project_uuid")?;
        let server_uuid = required_str(args, "server_uuid")?;
        let mut services = Vec::new();
        for component in selected_components(args) {
            let body = json!({
                "type": component.service_type,
                "project_uuid": project_uuid,
                "server_uuid": server_uuid,
                "name": component.name,
                "description": component.description,
            });
            match self.client.post("/services", &body).await {
                Ok(created) => {
                    if let Some(uuid) = created.get("uuid").and_then(Value::as_str) {
                        services.push(uuid.to_string());
                    }
                }
                Err(err) => {
                    self.logger.warn(
                        "Infrastructure stack stopped",
                        Some(&json!({
                            "service": component.name,
                            "created": services,
                            "error": err.message(),
                        })),
                    );
                    return Ok(StackReport {
                        project_uuid: project_uuid.to_string(),
                        services,
                        status: StackStatus::Failed,
                        message: format!("Deployment failed: {}", err.message()),
                    });
                }
            }
        }
        Ok(StackReport {
            project_uuid: project_uuid.to_string(),
            services,
            status: StackStatus::Deployed,
            message: "Infrastructure stack deployed successfully".to_string(),
        })
    }
}

#[async_trait]
impl ToolHandler for StackManager {
    async fn handle(&self, tool: &str, args: Value) -> Result<ToolOutput, ApiError> {
        match tool {
            "create_fullstack_project" => self.create_fullstack_project(&args).await,
            "deploy_infrastructure_stack" => {
                let report = self.deploy_infrastructure_stack(&args).await?;
                let message = report.message.clone();
                Ok(ToolOutput::new(serde_json::to_value(&report)?).with_message(message))
            }
            _ => Err(ApiError::invalid_params(format!("Unknown tool: {}", tool))),
        }
    }
}
