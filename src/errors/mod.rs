mod api_error;
mod config_error;
mod mcp_error;

pub use api_error::{
    ApiError, ApiResponse, UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_MESSAGE, VALIDATION_ERROR_SOURCES,
};
pub use config_error::ConfigError;
pub use mcp_error::{ErrorCode, McpError};
