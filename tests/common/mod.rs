#![allow(dead_code)]

use async_trait::async_trait;
use coolify_mcp::app::App;
use coolify_mcp::config::CoolifyConfig;
use coolify_mcp::errors::ApiError;
use coolify_mcp::services::logger::{LogLevel, Logger};
use coolify_mcp::services::transport::{HttpRequest, HttpResponse, HttpTransport};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

pub static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

pub const BASE_URL: &str = "http://coolify.test";
pub const TOKEN: &str = "test-token";

/// Replays queued replies in order and records every request it saw. An
/// exhausted script answers 599 so a missing entry is obvious in assertions.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Result<HttpResponse, ApiError>) -> &Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    pub fn reply(&self, status: u16, body: Value) -> &Self {
        self.push(Ok(json_response(status, body)))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|req| format!("{} {}", req.method, req.url.trim_start_matches(BASE_URL)))
            .collect()
    }

    pub fn bodies(&self) -> Vec<Option<Value>> {
        self.requests()
            .iter()
            .map(|req| req.body.as_deref().and_then(|b| serde_json::from_str(b).ok()))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request);
        }
        let next = self.replies.lock().ok().and_then(|mut replies| replies.pop_front());
        next.unwrap_or_else(|| Ok(text_response(599, "unscripted request")))
    }
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        422 => "Unprocessable Content",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    HttpResponse {
        status,
        status_text: status_text(status).to_string(),
        headers,
        body: body.to_string(),
    }
}

pub fn text_response(status: u16, body: &str) -> HttpResponse {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "text/html".to_string());
    HttpResponse {
        status,
        status_text: status_text(status).to_string(),
        headers,
        body: body.to_string(),
    }
}

pub fn quiet_logger() -> Logger {
    Logger::with_level("test", LogLevel::Error)
}

/// Config with retries disabled unless `file` says otherwise.
pub fn test_config(file: Option<Value>) -> CoolifyConfig {
    let file = file.unwrap_or_else(|| {
        serde_json::json!({
            "githubAppUuid": "gh-default",
            "retry": {
                "api": {"max_attempts": 1},
                "deployment": {"max_attempts": 1},
            },
        })
    });
    CoolifyConfig::from_sources(
        |key| match key {
            "COOLIFY_BASE_URL" => Some(BASE_URL.to_string()),
            "COOLIFY_ACCESS_TOKEN" => Some(TOKEN.to_string()),
            _ => None,
        },
        Some(&file),
    )
    .expect("test config")
}

pub fn test_app(transport: Arc<ScriptedTransport>) -> App {
    App::with_transport(quiet_logger(), test_config(None), transport).expect("app")
}
