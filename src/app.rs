use crate::config::CoolifyConfig;
use crate::constants::network;
use crate::errors::ApiError;
use crate::managers::applications::{ApplicationManager, APPLICATION_TOOLS};
use crate::managers::deployments::{DeploymentManager, DEPLOYMENT_TOOLS};
use crate::managers::env::{EnvManager, ENV_TOOLS};
use crate::managers::routes::RouteManager;
use crate::managers::stacks::{StackManager, STACK_TOOLS};
use crate::mcp::catalog::tool_catalog;
use crate::mcp::envelope::ErrorNormalizer;
use crate::services::coolify_client::CoolifyClient;
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use crate::services::transport::{HttpTransport, ReqwestTransport};
use crate::services::upsert::{BatchUpsertReconciler, EnvVarStore};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub config: CoolifyConfig,
    pub client: CoolifyClient,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    /// Every catalog tool must have a handler, and every handler a catalog
    /// entry (otherwise it could never pass argument validation).
    fn validate_tool_wiring(handlers: &HashMap<String, Arc<dyn ToolHandler>>) -> Result<(), ApiError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        let mut uncatalogued: Vec<String> = handlers
            .keys()
            .filter(|name| !tool_catalog().iter().any(|tool| &tool.name == *name))
            .cloned()
            .collect();
        if missing.is_empty() && uncatalogued.is_empty() {
            return Ok(());
        }
        missing.sort();
        uncatalogued.sort();
        Err(ApiError::new("Tool wiring is incomplete")
            .with_code("TOOL_WIRING")
            .with_details(serde_json::json!({
                "missing_tools": missing,
                "uncatalogued_tools": uncatalogued,
            })))
    }

    pub fn initialize(config_path: Option<&Path>) -> Result<Self, ApiError> {
        let logger = Logger::new("coolify");
        let config = CoolifyConfig::load(config_path)?;
        let transport = Arc::new(ReqwestTransport::new(
            config.request_timeout_ms,
            network::TIMEOUT_CONNECTION_MS,
        )?);
        Self::with_transport(logger, config, transport)
    }

    /// Wires every component around `transport`.
    pub fn with_transport(
        logger: Logger,
        config: CoolifyConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ApiError> {
        let profiles = Arc::new(config.retry_profiles()?);
        let client = CoolifyClient::new(
            logger.clone(),
            &config.base_url,
            &config.access_token,
            transport,
            profiles,
        )?;

        let store: Arc<dyn EnvVarStore> = Arc::new(client.clone());
        let reconciler = BatchUpsertReconciler::new(logger.clone(), store);

        let route_manager = Arc::new(RouteManager::new(client.clone()));
        let application_manager = Arc::new(ApplicationManager::new(
            logger.clone(),
            client.clone(),
            config.github_app_uuid.clone(),
        ));
        let env_manager = Arc::new(EnvManager::new(client.clone(), reconciler));
        let deployment_manager = Arc::new(DeploymentManager::new(client.clone()));
        let stack_manager = Arc::new(StackManager::new(logger.clone(), client.clone()));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        for tool in route_manager.tools() {
            handlers.insert(tool.to_string(), route_manager.clone());
        }
        for tool in APPLICATION_TOOLS {
            handlers.insert(tool.to_string(), application_manager.clone());
        }
        for tool in ENV_TOOLS {
            handlers.insert(tool.to_string(), env_manager.clone());
        }
        for tool in DEPLOYMENT_TOOLS {
            handlers.insert(tool.to_string(), deployment_manager.clone());
        }
        for tool in STACK_TOOLS {
            handlers.insert(tool.to_string(), stack_manager.clone());
        }

        Self::validate_tool_wiring(&handlers)?;

        let tool_executor = Arc::new(ToolExecutor::new(
            logger.clone(),
            ErrorNormalizer::new(config.dev_mode),
            handlers,
        ));

        logger.info(
            "Coolify MCP initialized",
            Some(&serde_json::json!({
                "base_url": config.base_url,
                "tools": tool_executor.tool_names().len(),
                "dev_mode": config.dev_mode,
            })),
        );

        Ok(Self {
            logger,
            config,
            client,
            tool_executor,
        })
    }
}
