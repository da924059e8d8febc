//! UTF-8 safe truncation helpers for previews and labels.

use std::borrow::Cow;

/// Largest byte index <= `i` that falls on a char boundary of `s`.
fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Truncate `s` to at most `max_bytes`, never splitting a UTF-8 codepoint.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        s
    } else {
        &s[..floor_char_boundary(s, max_bytes)]
    }
}

/// Single-line preview of `s`: newlines collapsed to spaces, cut to
/// `max_bytes` with a trailing `...` when anything was dropped.
pub fn one_line_preview(s: &str, max_bytes: usize) -> Cow<'_, str> {
    let trimmed = s.trim();
    let flat: Cow<'_, str> = if trimmed.contains('\n') {
        Cow::Owned(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
    } else {
        Cow::Borrowed(trimmed)
    };

    if flat.len() <= max_bytes {
        return flat;
    }
    let cut = truncate_str(&flat, max_bytes.saturating_sub(3));
    Cow::Owned(format!("{cut}..."))
}
