use crate::constants::{config as config_constants, network};
use crate::errors::ConfigError;
use crate::services::retry::RetryProfiles;
use crate::utils::feature_flags::is_truthy;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Runtime settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct CoolifyConfig {
    pub base_url: String,
    pub access_token: String,
    pub github_app_uuid: Option<String>,
    pub dev_mode: bool,
    pub request_timeout_ms: u64,
    pub retry_overrides: Option<Value>,
}

/// Shape of `coolify.config.local.json`. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalConfigFile {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    github_app_uuid: Option<String>,
    #[serde(default)]
    retry: Option<Value>,
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::MissingBaseUrl);
    }
    let parsed = url::Url::parse(trimmed).map_err(|err| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url: trimmed.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(trimmed.to_string())
}

fn read_local_file(path: &Path) -> Result<LocalConfigFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

impl CoolifyConfig {
    /// Reads the process environment, then the local config file. An explicit
    /// `config_path` must exist; the default file is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => Some(read_local_file(path)?),
            None => {
                let default_path = PathBuf::from(config_constants::LOCAL_CONFIG_FILE);
                if default_path.is_file() {
                    Some(read_local_file(&default_path)?)
                } else {
                    None
                }
            }
        };
        Self::resolve(|key| std::env::var(key).ok(), file.unwrap_or_default())
    }

    /// Same as [`load`](Self::load) with an injected environment and file body.
    pub fn from_sources<F>(env: F, file: Option<&Value>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = match file {
            Some(value) => serde_json::from_value(value.clone()).map_err(|source| {
                ConfigError::Parse {
                    path: "<inline>".to_string(),
                    source,
                }
            })?,
            None => LocalConfigFile::default(),
        };
        Self::resolve(env, parsed)
    }

    fn resolve<F>(env: F, file: LocalConfigFile) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = non_empty(file.base_url)
            .or_else(|| non_empty(env("COOLIFY_BASE_URL")))
            .unwrap_or_else(|| network::DEFAULT_BASE_URL.to_string());
        let base_url = normalize_base_url(&base_url)?;

        let access_token =
            non_empty(env("COOLIFY_ACCESS_TOKEN")).ok_or(ConfigError::MissingAccessToken)?;

        let github_app_uuid =
            non_empty(file.github_app_uuid).or_else(|| non_empty(env("COOLIFY_GITHUB_APP_UUID")));

        let dev_mode = env("COOLIFY_DEV_MODE").map(is_truthy).unwrap_or(false)
            || env("NODE_ENV")
                .map(|v| v.trim().eq_ignore_ascii_case("development"))
                .unwrap_or(false);

        let request_timeout_ms = non_empty(env("COOLIFY_REQUEST_TIMEOUT_MS"))
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(network::TIMEOUT_API_REQUEST_MS);

        let retry_overrides = file.retry.filter(|v| !v.is_null());
        // Fail at startup, not on the first tool call.
        RetryProfiles::with_overrides(retry_overrides.as_ref())?;

        Ok(Self {
            base_url,
            access_token,
            github_app_uuid,
            dev_mode,
            request_timeout_ms,
            retry_overrides,
        })
    }

    pub fn retry_profiles(&self) -> Result<RetryProfiles, ConfigError> {
        RetryProfiles::with_overrides(self.retry_overrides.as_ref())
    }
}
