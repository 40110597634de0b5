//! IRCv3 message tag escaping and decoding.

use std::collections::HashMap;
use std::fmt::{Result as FmtResult, Write};

/// Escape a tag value for serialization.
///
/// Escapes special characters according to the IRCv3 message-tags spec.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
///
/// Reverses the escaping applied by [`escape_tag_value`]. Unknown escapes
/// drop the backslash; a dangling backslash is discarded.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

/// Decode a raw tag section (without the leading `@`).
///
/// Pairs are separated by `;`. A key without `=` gets the empty string.
/// When a key repeats, the last value wins.
pub fn parse_tags(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), unescape_tag_value(value)),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_combined() {
        let input = "a\\:b\\sc\\\\d\\re\\nf";
        let expected = "a;b c\\d\re\nf";
        assert_eq!(unescape_tag_value(input), expected);
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape_tag_value("test\\"), "test");
    }

    #[test]
    fn test_unescape_unknown_escape() {
        assert_eq!(unescape_tag_value("a\\xb"), "axb");
    }

    #[test]
    fn test_escape_special_characters() {
        let mut escaped = String::new();
        escape_tag_value(&mut escaped, "complex; \\ \n \r all").unwrap();
        assert_eq!(escaped, "complex\\:\\s\\\\\\s\\n\\s\\r\\sall");
    }

    #[test]
    fn test_parse_tags_defaults_and_duplicates() {
        let tags = parse_tags("draft/multiline-concat;msgid=abc;msgid=def;label=a\\sb;;");
        assert_eq!(tags.len(), 3);
        assert_eq!(tags["draft/multiline-concat"], "");
        assert_eq!(tags["msgid"], "def");
        assert_eq!(tags["label"], "a b");
    }
}
