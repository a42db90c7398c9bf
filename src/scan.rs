//! Delimiter scanning over buffered response bytes.
//!
//! Stateless helpers used by the field state machine to find where the
//! current field ends. All of them operate on a plain byte slice (the
//! buffer's unread region) and return `None` when the buffered bytes end
//! before the answer is known, so the caller can suspend and retry after
//! the next chunk.

/// Find the byte that closes the outermost balanced `open`/`close` span.
///
/// Counting starts at the first `open` byte; the returned offset is the
/// position of the `close` byte that brings the nesting depth back to zero.
/// `None` means the span has not closed within `haystack` yet.
///
/// Known limitation, carried over from the wire format this was written
/// against: every occurrence of `open`/`close` is treated as structural,
/// including ones inside quoted JSON string values. Field values containing
/// a literal `{` or `}` inside a string are not supported.
pub fn find_balanced(haystack: &[u8], open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in haystack.iter().enumerate() {
        if b == open {
            depth += 1;
        } else if b == close && depth > 0 {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// [`find_balanced`] starting at offset `start`; the returned offset is
/// relative to the start of `haystack`, not to `start`.
pub fn find_balanced_from(haystack: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    if start >= haystack.len() {
        return None;
    }
    find_balanced(&haystack[start..], open, close).map(|i| start + i)
}

/// Whether `token` occurs anywhere in `haystack`.
pub fn contains_token(haystack: &[u8], token: &[u8]) -> bool {
    !token.is_empty() && haystack.windows(token.len()).any(|w| w == token)
}
