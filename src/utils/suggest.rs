//! "Did you mean" lookups for tool names, argument fields, and enum values.

/// Lowercased alphanumerics only, so `list-servers`, `ListServers` and
/// `list_servers` compare equal.
fn fold(value: &str) -> Vec<char> {
    value
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return a.len().max(b.len());
    }
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = (above + 1)
                .min(row[j] + 1)
                .min(diagonal + usize::from(ca != cb));
            diagonal = above;
        }
    }
    row[b.len()]
}

fn contains(haystack: &[char], needle: &[char]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn distance(input: &[char], candidate: &[char]) -> Option<usize> {
    if input.is_empty() || candidate.is_empty() {
        return None;
    }
    if input == candidate {
        return Some(0);
    }
    if contains(candidate, input) || contains(input, candidate) {
        return Some(1);
    }
    Some(edit_distance(input, candidate))
}

fn tolerance(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => (len * 35 / 100).max(3),
    }
}

/// Closest `candidates` to `input`, best first, at most `limit` of them.
pub fn suggest<S: AsRef<str>>(input: &str, candidates: &[S], limit: usize) -> Vec<String> {
    let folded = fold(input);
    if folded.is_empty() {
        return Vec::new();
    }
    let allowed = tolerance(folded.len());

    let mut scored: Vec<(usize, &str)> = candidates
        .iter()
        .map(|candidate| AsRef::<str>::as_ref(candidate))
        .filter_map(|candidate| {
            distance(&folded, &fold(candidate))
                .filter(|score| *score <= allowed)
                .map(|score| (score, candidate))
        })
        .collect();
    scored.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.len().cmp(&b.1.len()))
            .then_with(|| a.1.cmp(b.1))
    });
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(limit.max(1))
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::suggest;

    #[test]
    fn separators_and_case_are_ignored() {
        let tools = ["list_servers", "get_server", "list_services"];
        assert_eq!(suggest("List-Servers", &tools, 3)[0], "list_servers");
    }

    #[test]
    fn typos_within_tolerance() {
        let fields = ["max_items", "include_details", "fields"];
        assert_eq!(suggest("max_itmes", &fields, 3), vec!["max_items"]);
        assert!(suggest("zzzz", &fields, 3).is_empty());
        assert!(suggest("", &fields, 3).is_empty());
    }

    #[test]
    fn limit_is_honoured() {
        let names = ["start_service", "stop_service", "restart_service"];
        assert_eq!(suggest("service", &names, 2).len(), 2);
    }
}
