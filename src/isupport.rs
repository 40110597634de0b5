//! `RPL_ISUPPORT` (005) tracking.
//!
//! Servers announce their channel types, membership prefixes and mode
//! classes in one or more 005 lines. [`ServerSupport`] accumulates them so
//! NAMES and MODE handling can interpret prefixes and mode arguments.

use std::collections::BTreeMap;

/// Membership prefixes: `PREFIX=(ov)@+`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrefixSpec {
    /// Mode letters, highest rank first.
    pub modes: String,
    /// Matching symbols.
    pub prefixes: String,
}

impl PrefixSpec {
    pub fn parse(s: &str) -> Option<Self> {
        let open = s.find('(')?;
        let close = open + 1 + s[open + 1..].find(')')?;
        let modes = &s[open + 1..close];
        let prefixes = &s[close + 1..];
        (!modes.is_empty() && modes.chars().count() == prefixes.chars().count()).then(|| {
            PrefixSpec {
                modes: modes.to_string(),
                prefixes: prefixes.to_string(),
            }
        })
    }

    /// Symbol for a mode letter (`o` → `@`).
    pub fn symbol_for(&self, mode: char) -> Option<char> {
        let idx = self.modes.chars().position(|m| m == mode)?;
        self.prefixes.chars().nth(idx)
    }

    /// Rank of a symbol; lower is more powerful.
    pub fn rank(&self, symbol: char) -> Option<usize> {
        self.prefixes.chars().position(|p| p == symbol)
    }

    pub fn is_prefix(&self, symbol: char) -> bool {
        self.prefixes.contains(symbol)
    }
}

impl Default for PrefixSpec {
    fn default() -> Self {
        PrefixSpec {
            modes: "ov".to_string(),
            prefixes: "@+".to_string(),
        }
    }
}

/// Channel mode classes: `CHANMODES=A,B,C,D`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChanModes {
    /// List modes; always take an argument.
    pub a: String,
    /// Always take an argument.
    pub b: String,
    /// Take an argument only when set.
    pub c: String,
    /// Never take an argument.
    pub d: String,
}

impl ChanModes {
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(4, ',');
        let (a, b, c, d) = (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        Some(ChanModes {
            a: a.to_string(),
            b: b.to_string(),
            c: c.to_string(),
            d: d.to_string(),
        })
    }
}

impl Default for ChanModes {
    fn default() -> Self {
        ChanModes {
            a: "beI".to_string(),
            b: "k".to_string(),
            c: "l".to_string(),
            d: "imnpst".to_string(),
        }
    }
}

/// Accumulated server support tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerSupport {
    tokens: BTreeMap<String, Option<String>>,
    pub prefix: PrefixSpec,
    pub chanmodes: ChanModes,
}

impl ServerSupport {
    /// Apply the parameters of one 005 line (`<nick> TOKEN... :are supported`).
    pub fn apply(&mut self, params: &[String]) {
        let tokens = match params.len() {
            0..=2 => &params[params.len().min(1)..],
            n => &params[1..n - 1],
        };
        for token in tokens {
            if let Some(key) = token.strip_prefix('-') {
                self.tokens.remove(key);
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, Some(v.to_string())),
                None => (token.as_str(), None),
            };
            match key {
                "PREFIX" => {
                    if let Some(spec) = value.as_deref().and_then(PrefixSpec::parse) {
                        self.prefix = spec;
                    }
                }
                "CHANMODES" => {
                    if let Some(modes) = value.as_deref().and_then(ChanModes::parse) {
                        self.chanmodes = modes;
                    }
                }
                _ => {}
            }
            self.tokens.insert(key.to_string(), value);
        }
    }

    /// Raw token lookup. `Some(None)` means present without a value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.tokens.get(key).map(|v| v.as_deref())
    }

    pub fn network(&self) -> Option<&str> {
        self.get("NETWORK").flatten()
    }

    pub fn chantypes(&self) -> &str {
        self.get("CHANTYPES").flatten().unwrap_or("#&")
    }

    /// `MONITOR` target limit, if the server supports MONITOR.
    pub fn monitor_limit(&self) -> Option<Option<usize>> {
        self.get("MONITOR").map(|v| v.and_then(|n| n.parse().ok()))
    }

    /// Whether `name` starts with a channel type character.
    pub fn is_channel(&self, name: &str) -> bool {
        name.chars()
            .next()
            .is_some_and(|c| self.chantypes().contains(c))
    }

    /// Whether a mode letter consumes an argument in the given direction.
    pub fn mode_takes_arg(&self, mode: char, adding: bool) -> bool {
        self.prefix.modes.contains(mode)
            || self.chanmodes.a.contains(mode)
            || self.chanmodes.b.contains(mode)
            || (adding && self.chanmodes.c.contains(mode))
    }

    /// Split leading membership symbols off a NAMES entry: `@+nick` → `("@+", "nick")`.
    pub fn split_prefixes<'a>(&self, entry: &'a str) -> (&'a str, &'a str) {
        let idx = entry
            .char_indices()
            .find(|(_, c)| !self.prefix.is_prefix(*c))
            .map_or(entry.len(), |(i, _)| i);
        entry.split_at(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(line: &str) -> Vec<String> {
        crate::Message::parse(line, "irc.test").unwrap().params
    }

    #[test]
    fn test_apply_tokens() {
        let mut support = ServerSupport::default();
        support.apply(&params(
            ":irc.test 005 me NETWORK=Test PREFIX=(qaohv)~&@%+ CHANTYPES=# MONITOR=100 CHANMODES=beI,k,l,imnpst :are supported by this server",
        ));
        assert_eq!(support.network(), Some("Test"));
        assert_eq!(support.prefix.symbol_for('h'), Some('%'));
        assert_eq!(support.prefix.rank('~'), Some(0));
        assert_eq!(support.monitor_limit(), Some(Some(100)));
        assert!(support.is_channel("#rust"));
        assert!(!support.is_channel("&local"));
    }

    #[test]
    fn test_negated_token() {
        let mut support = ServerSupport::default();
        support.apply(&params(":s 005 me EXCEPTS :are supported"));
        assert_eq!(support.get("EXCEPTS"), Some(None));
        support.apply(&params(":s 005 me -EXCEPTS :are supported"));
        assert_eq!(support.get("EXCEPTS"), None);
    }

    #[test]
    fn test_mode_args() {
        let support = ServerSupport::default();
        assert!(support.mode_takes_arg('o', false));
        assert!(support.mode_takes_arg('b', true));
        assert!(support.mode_takes_arg('l', true));
        assert!(!support.mode_takes_arg('l', false));
        assert!(!support.mode_takes_arg('m', true));
    }

    #[test]
    fn test_split_prefixes() {
        let support = ServerSupport::default();
        assert_eq!(support.split_prefixes("@+nick"), ("@+", "nick"));
        assert_eq!(support.split_prefixes("nick"), ("", "nick"));
    }

    #[test]
    fn test_prefix_spec_rejects_mismatch() {
        assert!(PrefixSpec::parse("(ov)@").is_none());
        assert!(PrefixSpec::parse("@+").is_none());
    }
}
