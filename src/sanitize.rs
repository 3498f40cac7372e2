//! Strips the Markdown code fence models like to wrap scripts in.

const FENCE: &str = "```";

/// Removes one leading and one trailing fence line, if present.
///
/// Interior lines, including fence-looking ones, are returned verbatim.
/// Empty or whitespace-only input yields an empty string.
pub fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|line| is_fence(line)) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| is_fence(line)) {
        lines.pop();
    }
    lines.join("\n")
}

fn is_fence(line: &str) -> bool {
    line.trim().starts_with(FENCE)
}
