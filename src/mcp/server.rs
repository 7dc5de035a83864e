use crate::app::App;
use crate::errors::{ApiError, ErrorCode, McpError};
use crate::mcp::catalog::{list_tools, validate_tool_args};
use crate::mcp::protocol::{parse_line, text_content, JsonRpcRequest, JsonRpcResponse};
use crate::services::logger::Logger;
use crate::utils::output::bounded_stringify;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "coolify";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct McpServer {
    app: Arc<App>,
    logger: Logger,
}

impl McpServer {
    pub fn new(app: App) -> Self {
        let logger = app.logger.child("server");
        Self {
            app: Arc::new(app),
            logger,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> Result<Value, McpError> {
        let name = request.param_str("name").unwrap_or("").trim();
        if name.is_empty() {
            return Err(McpError::invalid_params("Missing tool name"));
        }
        let executor = &self.app.tool_executor;
        if !executor.has_handler(name) {
            return Err(McpError::invalid_params(
                executor.unknown_tool_error(name).message(),
            ));
        }
        let args = match request.params.get("arguments") {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(args) => args.clone(),
        };
        validate_tool_args(name, &args)?;

        let trace_id = uuid::Uuid::new_v4().to_string();
        let envelope = executor
            .execute_traced(name, args, &trace_id)
            .await
            .map_err(|err: ApiError| McpError::invalid_params(err.message()))?;
        Ok(text_content(bounded_stringify(&envelope.to_value())))
    }

    /// Reply for one request, `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            self.logger.debug(
                "Notification ignored",
                Some(&serde_json::json!({"method": request.method})),
            );
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        let result = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(list_tools()),
            "tools/call" => self.handle_tools_call(&request).await,
            other => Err(McpError::new(
                ErrorCode::MethodNotFound,
                format!("Method not found: {}", other),
            )),
        };
        Some(JsonRpcResponse::from_result(id, result))
    }

    /// Serves line-delimited JSON-RPC until `reader` is exhausted.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut writer = BufWriter::new(writer);

        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response = match parse_line(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(reply) => {
                    self.logger.warn("Rejected malformed request", None);
                    Some(reply)
                }
            };
            if let Some(response) = response {
                writer.write_all(response.to_line().as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        self.logger.info("stdin closed, shutting down", None);
        Ok(())
    }
}

pub async fn run_stdio(config_path: Option<&Path>) -> Result<(), McpError> {
    let app = App::initialize(config_path).map_err(|err| McpError::internal(err.message()))?;
    let server = McpServer::new(app);
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}
