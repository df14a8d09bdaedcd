//! Byte-subsequence search helpers for request framing and multipart
//! splitting. Callers track their own scan offsets so growing buffers are
//! not rescanned from the start on every chunk.

/// First occurrence of `needle` in `haystack` at or after `from`.
pub fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// First occurrence of `needle` anywhere in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    find_from(haystack, needle, 0)
}
