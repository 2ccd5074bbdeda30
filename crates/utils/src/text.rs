/// Shorten `text` to at most `max_chars` characters, appending `...` when cut.
///
/// Counts chars rather than bytes so CJK content is never split mid-codepoint.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Collapse newlines so a value fits on one table row.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
