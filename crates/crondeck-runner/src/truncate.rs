//! Size limit for captured command output.
//!
//! Captured stdout and stderr go into the history table, the per-run log and
//! HTTP responses. Oversized output keeps its opening and closing lines and
//! drops the middle.

/// Shorten `text` to at most `max_chars` characters by cutting out the middle.
///
/// Exactly `max_chars` characters survive: the first half and the remaining
/// tail, separated by a marker stating how many characters were dropped.
/// Cuts always fall on character boundaries.
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let head = max_chars / 2;
    let tail = max_chars - head;
    let omitted = total - head - tail;
    let head_end = byte_offset(text, head);
    let tail_start = byte_offset(text, total - tail);

    format!(
        "{}\n... [{omitted} chars omitted] ...\n{}",
        &text[..head_end],
        &text[tail_start..]
    )
}

/// Byte index of the `n`th character, or the end of `text`.
fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(i, _)| i)
}
