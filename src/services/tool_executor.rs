use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ApiError;
use crate::mcp::envelope::{format_tool_success, ErrorNormalizer, ToolEnvelope};
use crate::services::logger::Logger;
use crate::utils::suggest::suggest;

use serde_json::Value;

/// What a handler produced, before it is wrapped in an envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolOutput {
    pub data: Value,
    pub message: Option<String>,
    pub extra: Option<Value>,
}

impl ToolOutput {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            message: None,
            extra: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    /// A bare object that already says `success` is handed back untouched.
    fn is_preformatted(&self) -> bool {
        self.message.is_none()
            && self.extra.is_none()
            && self
                .data
                .as_object()
                .map(|obj| obj.contains_key("success"))
                .unwrap_or(false)
    }
}

impl From<Value> for ToolOutput {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, tool: &str, args: Value) -> Result<ToolOutput, ApiError>;
}

#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    normalizer: ErrorNormalizer,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(
        logger: Logger,
        normalizer: ErrorNormalizer,
        handlers: HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Self {
        Self {
            logger: logger.child("executor"),
            normalizer,
            handlers: Arc::new(handlers),
        }
    }

    pub fn has_handler(&self, tool: &str) -> bool {
        self.handlers.contains_key(tool)
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn unknown_tool_error(&self, tool: &str) -> ApiError {
        let suggestions = suggest(tool, &self.tool_names(), 5);
        let message = if suggestions.is_empty() {
            format!("Unknown tool: {}", tool)
        } else {
            format!(
                "Unknown tool: {}. Did you mean: {}",
                tool,
                suggestions.join(", ")
            )
        };
        ApiError::invalid_params(message)
            .with_code("UNKNOWN_TOOL")
            .with_details(serde_json::json!({ "suggestions": suggestions }))
    }

    pub fn wrap_output(output: ToolOutput) -> ToolEnvelope {
        if output.is_preformatted() {
            return ToolEnvelope::Preformatted(output.data);
        }
        ToolEnvelope::Success(format_tool_success(
            output.data,
            output.message.as_deref(),
            output.extra,
        ))
    }

    /// Runs `tool`. Handler failures come back as an error envelope; only an
    /// unknown tool name is an `Err`.
    pub async fn execute(&self, tool: &str, args: Value) -> Result<ToolEnvelope, ApiError> {
        self.execute_traced(tool, args, &uuid::Uuid::new_v4().to_string())
            .await
    }

    pub async fn execute_traced(
        &self,
        tool: &str,
        args: Value,
        trace_id: &str,
    ) -> Result<ToolEnvelope, ApiError> {
        let Some(handler) = self.handlers.get(tool) else {
            return Err(self.unknown_tool_error(tool));
        };
        let started = std::time::Instant::now();
        self.logger.debug(
            "Tool call started",
            Some(&serde_json::json!({"tool": tool, "trace_id": trace_id})),
        );

        let context = serde_json::json!({ "args": args.clone() });
        let envelope = match handler.handle(tool, args).await {
            Ok(output) => Self::wrap_output(output),
            Err(err) => {
                self.logger.warn(
                    "Tool call failed",
                    Some(&serde_json::json!({
                        "tool": tool,
                        "trace_id": trace_id,
                        "code": err.code(),
                        "message": err.message(),
                    })),
                );
                ToolEnvelope::Error(self.normalizer.format_tool_error(&err, tool, Some(&context)))
            }
        };

        self.logger.info(
            "Tool call finished",
            Some(&serde_json::json!({
                "tool": tool,
                "trace_id": trace_id,
                "success": envelope.is_success(),
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );
        Ok(envelope)
    }
}
