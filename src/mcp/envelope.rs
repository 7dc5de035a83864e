use crate::errors::ApiError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Keys a caller cannot override through `additional_info`.
const RESERVED_SUCCESS_KEYS: &[&str] = &["success", "data", "message"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    success: bool,
    pub error: ErrorBody,
    pub operation: String,
    pub timestamp: String,
}

impl ErrorEnvelope {
    pub fn success(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessEnvelope<T> {
    success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<T> SuccessEnvelope<T> {
    pub fn success(&self) -> bool {
        self.success
    }
}

/// What every tool invocation hands back to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolEnvelope {
    Success(SuccessEnvelope<Value>),
    Error(ErrorEnvelope),
    /// A result that already carried its own `success` flag.
    Preformatted(Value),
}

impl ToolEnvelope {
    pub fn is_success(&self) -> bool {
        match self {
            ToolEnvelope::Success(_) => true,
            ToolEnvelope::Error(_) => false,
            ToolEnvelope::Preformatted(value) => {
                value.get("success").and_then(|v| v.as_bool()).unwrap_or(false)
            }
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

pub fn format_tool_success<T>(
    data: T,
    message: Option<&str>,
    additional_info: Option<Value>,
) -> SuccessEnvelope<T> {
    let mut extra = Map::new();
    if let Some(Value::Object(info)) = additional_info {
        for (key, value) in info {
            if RESERVED_SUCCESS_KEYS.contains(&key.as_str()) {
                continue;
            }
            extra.insert(key, value);
        }
    }
    SuccessEnvelope {
        success: true,
        data,
        message: message.map(|m| m.to_string()),
        extra,
    }
}

/// Builds error envelopes. `include_stack` is the injected development-mode
/// flag; it only controls whether `error.stack` is emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorNormalizer {
    include_stack: bool,
}

impl ErrorNormalizer {
    pub fn new(include_stack: bool) -> Self {
        Self { include_stack }
    }

    pub fn format_tool_error(
        &self,
        failure: &ApiError,
        operation: &str,
        additional_context: Option<&Value>,
    ) -> ErrorEnvelope {
        let message = failure.message().to_string();
        let details = collect_details(failure, &message, additional_context);
        let stack = if self.include_stack {
            failure.stack.clone()
        } else {
            None
        };
        ErrorEnvelope {
            success: false,
            error: ErrorBody {
                message,
                code: failure.code(),
                details: (!details.is_empty()).then_some(Value::Object(details)),
                stack,
            },
            operation: operation.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

fn collect_details(
    failure: &ApiError,
    message: &str,
    additional_context: Option<&Value>,
) -> Map<String, Value> {
    let mut details = Map::new();
    match additional_context {
        Some(Value::Object(ctx)) => {
            for (key, value) in ctx {
                details.insert(key.clone(), value.clone());
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => {
            details.insert("context".to_string(), other.clone());
        }
    }

    if let Some(errors) = failure.validation_errors() {
        details.insert("VALIDATION_ERRORS".to_string(), errors.clone());
        details.insert("validationErrors".to_string(), errors.clone());
    }
    if let Some(data) = failure.response_data() {
        details.insert("fullApiResponse".to_string(), data.clone());
    }
    if let Some(api_details) = failure.details.as_ref().filter(|d| !d.is_null()) {
        details.insert("apiDetails".to_string(), api_details.clone());
    }
    if let Some(status) = failure.http_status() {
        details.insert("httpStatus".to_string(), Value::from(status));
    }
    if let Some(api_message) = failure
        .response_data()
        .and_then(|d| d.get("message"))
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty() && *m != message)
    {
        details.insert(
            "apiMessage".to_string(),
            Value::String(api_message.to_string()),
        );
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ApiResponse, UNKNOWN_ERROR_CODE};
    use serde_json::json;

    fn without_timestamp(mut value: Value) -> Value {
        if let Some(obj) = value.as_object_mut() {
            obj.remove("timestamp");
        }
        value
    }

    #[test]
    fn validation_errors_surface_under_both_keys() {
        let err = ApiError::new("Validation failed").with_response(ApiResponse::new(
            422,
            "Unprocessable Content",
            json!({"message": "The given data was invalid.", "errors": ["name required"]}),
        ));
        let envelope = ErrorNormalizer::default().format_tool_error(&err, "create_project", None);
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"]["code"], json!("422"));
        assert_eq!(value["error"]["details"]["VALIDATION_ERRORS"], json!(["name required"]));
        assert_eq!(value["error"]["details"]["validationErrors"], json!(["name required"]));
        assert_eq!(value["error"]["details"]["httpStatus"], json!(422));
        assert_eq!(
            value["error"]["details"]["apiMessage"],
            json!("The given data was invalid.")
        );
        assert_eq!(value["operation"], json!("create_project"));
    }

    #[test]
    fn plain_objects_degrade_to_defaults() {
        let err = ApiError::from_value(json!({"weird": "object"}));
        let envelope = ErrorNormalizer::default().format_tool_error(&err, "op", None);
        assert!(!envelope.success());
        assert_eq!(envelope.error.code, UNKNOWN_ERROR_CODE);
        assert!(!envelope.error.message.is_empty());
        assert!(envelope.error.details.is_none());
    }

    #[test]
    fn context_merges_and_stack_is_gated() {
        let err = ApiError::new("boom").with_stack("at handler");
        let ctx = json!({"args": {"uuid": "abc"}});
        let prod = ErrorNormalizer::new(false).format_tool_error(&err, "op", Some(&ctx));
        assert!(prod.error.stack.is_none());
        assert_eq!(prod.error.details, Some(json!({"args": {"uuid": "abc"}})));
        let dev = ErrorNormalizer::new(true).format_tool_error(&err, "op", Some(&ctx));
        assert_eq!(dev.error.stack.as_deref(), Some("at handler"));
    }

    #[test]
    fn error_formatting_is_stable_apart_from_timestamp() {
        let err = ApiError::new("nope")
            .with_code("E1")
            .with_details(json!({"errors": ["x"]}));
        let normalizer = ErrorNormalizer::default();
        let a = serde_json::to_value(normalizer.format_tool_error(&err, "op", None)).expect("a");
        let b = serde_json::to_value(normalizer.format_tool_error(&err, "op", None)).expect("b");
        assert_eq!(without_timestamp(a), without_timestamp(b));
    }

    #[test]
    fn success_formatting_is_repeatable() {
        let build = || {
            serde_json::to_value(format_tool_success(
                json!([{"uuid": "s1"}]),
                Some("Listed"),
                Some(json!({"pagination": {"total": 1}})),
            ))
            .expect("serialize")
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn success_envelope_shapes() {
        let deleted = serde_json::to_value(format_tool_success(Value::Null, Some("Deleted"), None))
            .expect("serialize");
        assert_eq!(deleted, json!({"success": true, "data": null, "message": "Deleted"}));

        let absent = serde_json::to_value(format_tool_success(None::<Value>, None, None))
            .expect("serialize");
        assert_eq!(absent, json!({"success": true, "data": null}));

        let extra = serde_json::to_value(format_tool_success(
            json!({"uuid": "d1"}),
            None,
            Some(json!({"deployment_uuid": "d1", "success": false})),
        ))
        .expect("serialize");
        assert_eq!(extra["success"], json!(true));
        assert_eq!(extra["deployment_uuid"], json!("d1"));
    }
}
