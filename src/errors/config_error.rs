use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("COOLIFY_ACCESS_TOKEN environment variable is required")]
    MissingAccessToken,
    #[error("Coolify base URL is required")]
    MissingBaseUrl,
    #[error("invalid Coolify base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid retry profile '{profile}': {reason}")]
    InvalidRetryProfile { profile: String, reason: String },
}
