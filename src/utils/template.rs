use crate::errors::ApiError;
use serde_json::Value;

fn stringify_resolved(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(num) => Some(num.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
pub fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Fills `{name}` placeholders in `template` from top-level keys of `args`.
pub fn render_path(template: &str, args: &Value) -> Result<String, ApiError> {
    let mut out = String::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let (prefix, tail) = rest.split_at(start);
        out.push_str(prefix);
        let Some(end) = tail.find('}') else {
            out.push_str(tail);
            rest = "";
            break;
        };
        let name = tail[1..end].trim();
        let value = args
            .get(name)
            .and_then(stringify_resolved)
            .ok_or_else(|| ApiError::invalid_params(format!("{} is required", name)))?;
        out.push_str(&encode_path_segment(&value));
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Placeholder names in `template`, in order of appearance.
pub fn placeholder_names(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            break;
        };
        names.push(tail[1..end].trim());
        rest = &tail[end + 1..];
    }
    names
}

/// Appends `pairs` as a query string, leaving `path` untouched when empty.
pub fn append_query(path: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    match serde_urlencoded::to_string(pairs) {
        Ok(query) if !query.is_empty() => {
            let separator = if path.contains('?') { '&' } else { '?' };
            format!("{}{}{}", path, separator, query)
        }
        _ => path.to_string(),
    }
}

/// Collects the listed argument keys that are present as query pairs.
pub fn query_pairs(args: &Value, keys: &[&str]) -> Vec<(String, String)> {
    keys.iter()
        .filter_map(|key| {
            args.get(*key)
                .and_then(stringify_resolved)
                .map(|value| (key.to_string(), value))
        })
        .collect()
}
