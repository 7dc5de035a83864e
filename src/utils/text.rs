/// Length in characters, which is what the response limits are expressed in.
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// First `max_chars` characters of `value`, never splitting a code point.
pub fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// Cuts `value` to `max_chars` and appends `marker` when anything was dropped.
pub fn truncate_with_marker(value: &str, max_chars: usize, marker: &str) -> String {
    let head = truncate_chars(value, max_chars);
    if head.len() == value.len() {
        return value.to_string();
    }
    format!("{}{}", head, marker)
}
