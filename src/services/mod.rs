pub mod classifier;
pub mod coolify_client;
pub mod logger;
pub mod retry;
pub mod tool_executor;
pub mod transport;
pub mod upsert;
