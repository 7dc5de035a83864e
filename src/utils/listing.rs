use crate::constants::limits;
use serde::Serialize;
use serde_json::{Map, Value};

const MAX_LIST_LIMIT: usize = 500;

/// Caller knobs accepted by every list tool.
#[derive(Clone, Debug)]
pub struct ListOptions {
    pub max_items: usize,
    pub include_details: bool,
    pub fields: Vec<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            max_items: limits::MAX_LIST_ITEMS,
            include_details: false,
            fields: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub returned: usize,
    pub truncated: bool,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListPage {
    pub items: Vec<Value>,
    pub pagination: Pagination,
}

impl ListPage {
    /// `{"pagination": {...}}`, ready to merge into a success envelope.
    pub fn extra(&self) -> Value {
        serde_json::json!({ "pagination": self.pagination })
    }
}

fn parse_usize(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::Number(num) => num.as_u64().map(|v| v as usize),
        Value::String(text) => text.trim().parse::<usize>().ok(),
        _ => None,
    }
}

fn parse_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => crate::utils::feature_flags::is_truthy(text),
        _ => false,
    }
}

impl ListOptions {
    pub fn from_args(args: &Value) -> Self {
        let mut out = ListOptions::default();
        let Some(map) = args.as_object() else {
            return out;
        };
        if let Some(limit) = parse_usize(map.get("max_items").or_else(|| map.get("limit"))) {
            out.max_items = limit.clamp(1, MAX_LIST_LIMIT);
        }
        out.include_details = parse_bool(map.get("include_details"));
        if let Some(fields) = map.get("fields").and_then(|v| v.as_array()) {
            out.fields = fields
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect();
        }
        out
    }
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null() && value.as_str() != Some(""))
}

fn pick_fields(map: &Map<String, Value>, fields: &[String]) -> Value {
    let mut out = Map::new();
    for field in fields {
        if let Some(entry) = map.get(field) {
            out.insert(field.clone(), entry.clone());
        }
    }
    Value::Object(out)
}

/// Compact view of a single resource.
pub fn summarize_item(item: &Value, options: &ListOptions) -> Value {
    let Some(map) = item.as_object() else {
        return item.clone();
    };
    if !options.fields.is_empty() {
        return pick_fields(map, &options.fields);
    }
    let mut out = Map::new();
    out.insert(
        "uuid".to_string(),
        first_present(map, &["uuid", "id"]).cloned().unwrap_or(Value::Null),
    );
    out.insert(
        "name".to_string(),
        first_present(map, &["name", "title"])
            .cloned()
            .unwrap_or_else(|| Value::String("Unnamed".to_string())),
    );
    out.insert(
        "status".to_string(),
        map.get("status").cloned().unwrap_or(Value::Null),
    );
    out.insert(
        "created_at".to_string(),
        map.get("created_at").cloned().unwrap_or(Value::Null),
    );
    if options.include_details {
        for (key, value) in map {
            out.insert(key.clone(), value.clone());
        }
    }
    Value::Object(out)
}

/// Summarizes `items` and caps them at `options.max_items`.
pub fn paginate(items: &[Value], entity: &str, options: &ListOptions) -> ListPage {
    let total = items.len();
    let truncated = total > options.max_items;
    let kept: Vec<Value> = items
        .iter()
        .take(options.max_items)
        .map(|item| summarize_item(item, options))
        .collect();
    let message = if truncated {
        format!(
            "Showing first {} of {} {}. Use max_items or include_details to adjust.",
            options.max_items, total, entity
        )
    } else {
        format!("Showing all {} {}", total, entity)
    };
    ListPage {
        pagination: Pagination {
            total,
            returned: kept.len(),
            truncated,
            message,
        },
        items: kept,
    }
}
