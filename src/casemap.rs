//! IRC case-mapping functions.
//!
//! Nicknames and channel names compare case-insensitively with the
//! `rfc1459` mapping, where `[]\~` are the uppercase forms of `{}|^`.
//! Session state keys users and channels by [`irc_to_lower`].

#[inline]
fn fold(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => c.to_ascii_lowercase(),
        _ => c,
    }
}

/// Convert a string to IRC lowercase using RFC 1459 case mapping.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(fold).collect()
}

/// Compare two strings using IRC case-insensitive comparison.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.chars().zip(b.chars()).all(|(x, y)| fold(x) == fold(y))
}

/// Whether `haystack` mentions `nick` as a whole word, case-insensitively.
pub fn mentions(haystack: &str, nick: &str) -> bool {
    if nick.is_empty() {
        return false;
    }
    let haystack = irc_to_lower(haystack);
    let nick = irc_to_lower(nick);
    let is_word = |c: char| c.is_alphanumeric() || "-_[]{}\\|^`".contains(c);

    haystack.match_indices(&nick).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + nick.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irc_to_lower() {
        assert_eq!(irc_to_lower("Nick[Away]"), "nick{away}");
        assert_eq!(irc_to_lower("A\\B~C"), "a|b^c");
    }

    #[test]
    fn test_irc_eq() {
        assert!(irc_eq("Nick[a]", "nick{A}"));
        assert!(!irc_eq("nick", "nick_"));
    }

    #[test]
    fn test_mentions() {
        assert!(mentions("hey Alice, ping", "alice"));
        assert!(mentions("ALICE: hi", "alice"));
        assert!(!mentions("malice everywhere", "alice"));
        assert!(!mentions("alice_ is someone else", "alice"));
        assert!(!mentions("anything", ""));
    }
}
