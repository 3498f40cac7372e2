pub fn term_width() -> usize {
    term_size::dimensions().map_or(80, |(w, _)| w)
}

/// Horizontal rule for script banners, never wider than `max` columns.
pub fn rule(max: usize) -> String {
    "=".repeat(term_width().min(max))
}

/// Returns the last `max_chars` characters of `text`.
///
/// Counts characters, not bytes, so the cut never lands inside a multi-byte
/// sequence. The result is always a suffix of `text`.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
