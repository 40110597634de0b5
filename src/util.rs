//! Line-length helpers.
//!
//! Safe truncation and word-aware splitting of outbound payloads.

/// Maximum length for the IRCv3 tags section.
pub const MAX_TAGS_LENGTH: usize = 8191;

/// Maximum length of a line body (excluding tags), CRLF included.
pub const MAX_MESSAGE_BODY: usize = 512;

/// A split may back up to a space only if the space lies at or past this
/// fraction (in percent) of the limit.
pub const WORD_BREAK_FLOOR_PERCENT: usize = 70;

/// Truncates a string to at most `max_bytes` bytes without breaking
/// a multi-byte UTF-8 codepoint at the end.
///
/// ```
/// use slirc_client::util::truncate_utf8_safe;
///
/// assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
/// assert_eq!(truncate_utf8_safe("Hello 👋 World", 8), "Hello ");
/// assert_eq!(truncate_utf8_safe("hi", 10), "hi");
/// ```
#[inline]
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// Splits a payload into chunks of at most `max_bytes` bytes.
///
/// A chunk ends just after the last space that sits at or beyond
/// [`WORD_BREAK_FLOOR_PERCENT`] of the limit; without such a space it is cut
/// at the byte ceiling (backed off to a codepoint boundary). Concatenating
/// the chunks yields the input.
///
/// ```
/// use slirc_client::util::split_message;
///
/// let chunks: Vec<_> = split_message("aaaaaaaa bbbbbbbbbb", 10).collect();
/// assert_eq!(chunks, vec!["aaaaaaaa ", "bbbbbbbbbb"]);
///
/// let chunks: Vec<_> = split_message("aa bbbbbbbbbbbb", 10).collect();
/// assert_eq!(chunks, vec!["aa bbbbbbb", "bbbbb"]);
/// ```
pub fn split_message(s: &str, max_bytes: usize) -> impl Iterator<Item = &str> {
    SplitMessage {
        remaining: s,
        max_bytes: max_bytes.max(1),
    }
}

struct SplitMessage<'a> {
    remaining: &'a str,
    max_bytes: usize,
}

impl<'a> Iterator for SplitMessage<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        if self.remaining.len() <= self.max_bytes {
            return Some(std::mem::take(&mut self.remaining));
        }

        let mut hard = truncate_utf8_safe(self.remaining, self.max_bytes).len();
        if hard == 0 {
            // Limit smaller than the first codepoint; emit it whole.
            hard = self
                .remaining
                .chars()
                .next()
                .map_or(self.remaining.len(), char::len_utf8);
        }

        let floor = self.max_bytes * WORD_BREAK_FLOOR_PERCENT / 100;
        let cut = self.remaining[..hard]
            .rfind(' ')
            .filter(|&i| i >= floor)
            .map_or(hard, |i| i + 1);

        let (chunk, rest) = self.remaining.split_at(cut);
        self.remaining = rest;
        Some(chunk)
    }
}
