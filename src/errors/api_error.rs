use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::time::Duration;

pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR";

/// The upstream response attached to an HTTP-level failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub status_text: String,
    pub data: Value,
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    pub fn new(status: u16, status_text: impl Into<String>, data: Value) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            data,
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

/// Failure raised by the HTTP primitive or by a tool handler.
///
/// Every field is optional because failures arrive in many shapes: transport
/// errors carry only a code, HTTP errors carry a response body, and arbitrary
/// JSON payloads may carry anything at all. Consumers inspect the fields and
/// fall back to defaults instead of assuming a shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiError {
    pub message: Option<String>,
    pub code: Option<String>,
    pub response: Option<ApiResponse>,
    pub details: Option<Value>,
    pub errors: Option<Value>,
    pub timed_out: bool,
    pub stack: Option<String>,
    coerced: Option<String>,
}

type ValidationSource = fn(&ApiError) -> Option<&Value>;

fn response_data_errors(err: &ApiError) -> Option<&Value> {
    err.response.as_ref().and_then(|r| r.data.get("errors"))
}

fn details_errors(err: &ApiError) -> Option<&Value> {
    err.details.as_ref().and_then(|d| d.get("errors"))
}

fn top_level_errors(err: &ApiError) -> Option<&Value> {
    err.errors.as_ref()
}

/// Search order for validation-error arrays. The first non-empty hit wins.
pub const VALIDATION_ERROR_SOURCES: &[(&str, ValidationSource)] = &[
    ("response.data.errors", response_data_errors),
    ("details.errors", details_errors),
    ("errors", top_level_errors),
];

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

fn value_to_code(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_response(mut self, response: ApiResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn timed_out(mut self) -> Self {
        self.timed_out = true;
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(message).with_code("INVALID_PARAMS")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_code("NOT_FOUND")
    }

    pub fn cancelled() -> Self {
        Self::new("Operation cancelled").with_code("CANCELLED")
    }

    /// Builds an error from an arbitrary JSON value.
    ///
    /// Recognised keys: `message`, `code`, `response.{status,statusText,data}`,
    /// `details`, `errors`, `stack`, `timeout`. Strings become the message.
    /// Anything else keeps its JSON text as the string coercion.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::String(text) => Self {
                message: (!text.is_empty()).then_some(text),
                ..Self::default()
            },
            Value::Object(map) => {
                let message = map
                    .get("message")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string());
                let code = map.get("code").and_then(value_to_code);
                let response = map.get("response").and_then(|raw| {
                    let status = raw.get("status").and_then(|v| v.as_u64())?;
                    let status = u16::try_from(status).ok()?;
                    let status_text = raw
                        .get("statusText")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    let data = raw.get("data").cloned().unwrap_or(Value::Null);
                    Some(ApiResponse::new(status, status_text, data))
                });
                let timed_out = map
                    .get("timeout")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                Self {
                    message,
                    code,
                    response,
                    details: map.get("details").cloned().filter(|v| !v.is_null()),
                    errors: map.get("errors").cloned().filter(|v| !v.is_null()),
                    timed_out,
                    stack: map
                        .get("stack")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    coerced: Some(Value::Object(map).to_string()),
                }
            }
            other => Self {
                coerced: Some(other.to_string()),
                ..Self::default()
            },
        }
    }

    /// The failure's own message, else its string coercion, else the
    /// unknown-error default. Never empty.
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.coerced.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(UNKNOWN_ERROR_MESSAGE)
    }

    /// Explicit code, else the HTTP status, else `UNKNOWN_ERROR`.
    pub fn code(&self) -> String {
        if let Some(code) = self.code.as_ref().filter(|c| !c.trim().is_empty()) {
            return code.clone();
        }
        if let Some(response) = &self.response {
            return response.status.to_string();
        }
        UNKNOWN_ERROR_CODE.to_string()
    }

    pub fn http_status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    pub fn response_data(&self) -> Option<&Value> {
        self.response
            .as_ref()
            .map(|r| &r.data)
            .filter(|data| !data.is_null())
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.response.as_ref().and_then(|r| r.retry_after)
    }

    /// First non-empty validation-error payload along
    /// [`VALIDATION_ERROR_SOURCES`], evaluated lazily in order.
    pub fn validation_errors(&self) -> Option<&Value> {
        VALIDATION_ERROR_SOURCES
            .iter()
            .find_map(|(_, source)| source(self).filter(|v| is_present(v)))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl Error for ApiError {}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::new(format!("Invalid JSON: {}", err)).with_code("INVALID_JSON")
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::new(err.to_string()).with_code("IO_ERROR")
    }
}

impl From<super::ConfigError> for ApiError {
    fn from(err: super::ConfigError) -> Self {
        ApiError::new(err.to_string()).with_code("CONFIG_ERROR")
    }
}
