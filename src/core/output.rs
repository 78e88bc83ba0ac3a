//! Text shaping for the `status` and `state-check` renderers.

/// One-line preview of free text (goals, titles): whitespace runs become a
/// single space and anything past `limit` characters becomes `...`.
pub fn compact_line(text: &str, limit: usize) -> String {
    let mut line = String::new();
    for (n, word) in text.split_whitespace().enumerate() {
        if n > 0 {
            line.push(' ');
        }
        line.push_str(word);
    }
    match line.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line,
    }
}

/// Comma-joined list, or `(none)` when empty.
pub fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

/// Bulleted issue list, one per line, numbered from 1.
pub fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("  {}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}
