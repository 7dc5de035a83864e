pub fn is_truthy(value: impl AsRef<str>) -> bool {
    matches!(
        value.as_ref().trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::is_truthy;

    #[test]
    fn truthy_values() {
        for raw in ["1", "true", " YES ", "on"] {
            assert!(is_truthy(raw), "{raw}");
        }
        for raw in ["", "0", "off", "development"] {
            assert!(!is_truthy(raw), "{raw}");
        }
    }
}
