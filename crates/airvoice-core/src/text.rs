//! UTF-8–safe string truncation for log previews.
//!
//! Slicing a `&str` at an arbitrary byte offset panics when the offset
//! lands inside a multi-byte character; this helper snaps back to the
//! nearest char boundary so previews of wire data are always safe.

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
#[inline]
#[must_use]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
