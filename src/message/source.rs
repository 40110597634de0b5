//! Message sources (`nick!user@host` or a server name).

use std::fmt;

/// Origin of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Source {
    /// Nickname, or the server name for server-originated lines.
    pub name: String,
    /// Username part, if sent.
    pub user: Option<String>,
    /// Hostname part, if sent.
    pub host: Option<String>,
}

impl Source {
    /// Split a raw source into name, user and host.
    pub fn parse(raw: &str) -> Self {
        let (rest, host) = match raw.split_once('@') {
            Some((rest, host)) => (rest, Some(host.to_string())),
            None => (raw, None),
        };
        let (name, user) = match rest.split_once('!') {
            Some((name, user)) => (name, Some(user.to_string())),
            None => (rest, None),
        };
        Source {
            name: name.to_string(),
            user,
            host,
        }
    }

    /// Heuristic: a bare name containing a dot is a server.
    pub fn is_server(&self) -> bool {
        self.user.is_none() && self.host.is_none() && self.name.contains('.')
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(user) = &self.user {
            write!(f, "!{}", user)?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{}", host)?;
        }
        Ok(())
    }
}
