//! User records.

use std::collections::BTreeMap;

/// A metadata value and who may see it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetadataEntry {
    pub value: String,
    pub visibility: Option<String>,
}

/// What the session knows about one user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub nick: String,
    pub username: Option<String>,
    pub host: Option<String>,
    pub realname: Option<String>,
    pub account: Option<String>,
    pub online: bool,
    pub away: bool,
    pub away_message: Option<String>,
    pub metadata: BTreeMap<String, MetadataEntry>,
}

impl User {
    pub fn new(nick: impl Into<String>) -> Self {
        User {
            nick: nick.into(),
            online: true,
            ..Default::default()
        }
    }

    pub fn set_away(&mut self, message: Option<String>) {
        self.away = message.is_some();
        self.away_message = message;
    }

    /// Store or remove (`None`) a metadata key.
    pub fn set_metadata(&mut self, key: &str, value: Option<String>, visibility: Option<String>) {
        match value {
            Some(value) => {
                self.metadata
                    .insert(key.to_string(), MetadataEntry { value, visibility });
            }
            None => {
                self.metadata.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_away_flag_follows_message() {
        let mut user = User::new("alice");
        assert!(user.online);
        user.set_away(Some("lunch".into()));
        assert!(user.away);
        user.set_away(None);
        assert!(!user.away);
        assert_eq!(user.away_message, None);
    }

    #[test]
    fn test_metadata_set_and_clear() {
        let mut user = User::new("alice");
        user.set_metadata("avatar", Some("https://x/a.png".into()), Some("*".into()));
        assert_eq!(user.metadata["avatar"].value, "https://x/a.png");
        user.set_metadata("avatar", None, None);
        assert!(user.metadata.is_empty());
    }
}
