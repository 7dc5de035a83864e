use crate::errors::ApiError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::error::Error as _;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// `Retry-After` as delta seconds. HTTP-date values are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// The outbound HTTP call primitive. Network-level failures come back as
/// `Err`; any HTTP status, including errors, comes back as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout_ms: u64, connect_timeout_ms: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .connect_timeout(Duration::from_millis(connect_timeout_ms))
            .build()
            .map_err(|err| {
                ApiError::new(format!("Failed to build HTTP client: {}", err)).with_code("INTERNAL")
            })?;
        Ok(Self { client })
    }
}

fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ApiError> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| ApiError::invalid_params(format!("Invalid header name: {}", key)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ApiError::invalid_params(format!("Invalid header value for {}", key)))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn source_chain(err: &reqwest::Error) -> String {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        lines.push(format!("caused by: {}", inner));
        source = inner.source();
    }
    lines.join("\n")
}

/// Maps transport failures onto node-style network codes so that
/// classification does not depend on the HTTP library.
pub fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    let stack = source_chain(&err);
    if err.is_timeout() {
        return ApiError::new(format!("Request timed out: {}", err))
            .with_code("ETIMEDOUT")
            .with_stack(stack)
            .timed_out();
    }
    let code = if err.is_connect() {
        "ECONNREFUSED"
    } else if err.is_builder() {
        "INVALID_REQUEST"
    } else {
        "ECONNRESET"
    };
    ApiError::new(err.to_string())
        .with_code(code)
        .with_stack(stack)
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(to_header_map(&request.headers)?);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }
}
