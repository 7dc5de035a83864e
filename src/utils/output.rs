use crate::constants::limits;
use crate::utils::text::{char_len, truncate_with_marker};
use serde_json::{Map, Value};

pub const LOG_TRUNCATION_MARKER: &str = "\n... [truncated - content too large]";
const OVERSIZED_MESSAGE: &str =
    "Response truncated due to size limits. Use specific queries to get detailed information.";

/// Bounds a log payload: long strings are cut, long arrays keep their tail.
pub fn truncate_logs(logs: Value) -> Value {
    match logs {
        Value::String(text) if char_len(&text) > limits::MAX_LOG_CHARS => Value::String(
            truncate_with_marker(&text, limits::MAX_LOG_CHARS, LOG_TRUNCATION_MARKER),
        ),
        Value::Array(entries)
            if serde_json::to_string(&entries).map(|s| s.len()).unwrap_or(0)
                > limits::MAX_LOG_CHARS =>
        {
            let skip = entries.len().saturating_sub(limits::LOG_TAIL_ENTRIES);
            Value::Array(entries.into_iter().skip(skip).collect())
        }
        other => other,
    }
}

/// Drops fields that are too large or too sensitive to hand back verbatim.
pub fn compact_application(mut app: Value) -> Value {
    let Some(map) = app.as_object_mut() else {
        return app;
    };
    for key in ["docker_compose_raw", "docker_compose"] {
        if map.get(key).map(|v| !v.is_null()).unwrap_or(false) {
            map.insert(key.to_string(), Value::String("[Truncated - too large]".to_string()));
        }
    }
    if let Some(labels) = map.get("custom_labels").and_then(|v| v.as_str()) {
        if char_len(labels) > 100 {
            let cut = truncate_with_marker(labels, 100, "...[Truncated]");
            map.insert("custom_labels".to_string(), Value::String(cut));
        }
    }
    if map.contains_key("environment_variables") {
        map.insert(
            "environment_variables".to_string(),
            Value::String("[Environment variables hidden]".to_string()),
        );
    }
    app
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Serializes an envelope, degrading it when the text would exceed the
/// response budget.
pub fn bounded_stringify(envelope: &Value) -> String {
    let text = pretty(envelope);
    if char_len(&text) <= limits::MAX_RESPONSE_CHARS {
        return text;
    }
    let Some(map) = envelope.as_object() else {
        return text;
    };
    if let Some(items) = map.get("data").and_then(|v| v.as_array()) {
        let mut reduced = map.clone();
        let original = items.len();
        reduced.insert(
            "data".to_string(),
            Value::Array(items.iter().take(limits::OVERSIZED_LIST_ITEMS).cloned().collect()),
        );
        let mut pagination = map
            .get("pagination")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        pagination.insert("truncated".to_string(), Value::Bool(true));
        pagination.insert(
            "message".to_string(),
            Value::String(format!(
                "Response too large. Showing only first {} items. Original count: {}",
                limits::OVERSIZED_LIST_ITEMS,
                original
            )),
        );
        reduced.insert("pagination".to_string(), Value::Object(pagination));
        return pretty(&Value::Object(reduced));
    }
    let mut degraded = Map::new();
    degraded.insert(
        "success".to_string(),
        map.get("success").cloned().unwrap_or(Value::Null),
    );
    degraded.insert(
        "error".to_string(),
        map.get("error")
            .cloned()
            .unwrap_or_else(|| Value::String("Response too large to display".to_string())),
    );
    degraded.insert(
        "message".to_string(),
        Value::String(OVERSIZED_MESSAGE.to_string()),
    );
    pretty(&Value::Object(degraded))
}
