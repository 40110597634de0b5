//! Parsed IRC lines.
//!
//! [`Message`] is the owned, decoded form of one protocol line: tag map,
//! [`Source`], upper-cased command and ordered parameters.

mod nom_parser;
mod source;
pub mod tags;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::MessageParseError;
use crate::ircv3::server_time::parse_server_time;

pub use self::source::Source;

/// One decoded protocol line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// IRCv3 tags with unescaped values. Valueless tags map to `""`.
    pub tags: HashMap<String, String>,
    /// Origin of the line; the configured server name when the line had none.
    pub source: Source,
    /// Command token, ASCII upper-cased. Numerics stay as three digits.
    pub command: String,
    /// Middle parameters followed by the trailing parameter.
    pub params: Vec<String>,
}

impl Message {
    /// Parse a raw line, using `default_source` when the line carries no source.
    ///
    /// ```
    /// use slirc_client::Message;
    ///
    /// let msg = Message::parse(":a!b@c PRIVMSG #x :hello world ", "irc.example.net").unwrap();
    /// assert_eq!(msg.source.name, "a");
    /// assert_eq!(msg.command, "PRIVMSG");
    /// assert_eq!(msg.params, vec!["#x", "hello world "]);
    /// ```
    pub fn parse(line: &str, default_source: &str) -> Result<Self, MessageParseError> {
        let raw = nom_parser::split_line(line)?;
        Ok(Message {
            tags: raw.tags.map(tags::parse_tags).unwrap_or_default(),
            source: Source::parse(raw.source.unwrap_or(default_source)),
            command: raw.command.to_ascii_uppercase(),
            params: raw.params.into_iter().map(str::to_owned).collect(),
        })
    }

    /// Build a message without tags or source.
    pub fn new<I, S>(command: &str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Message {
            tags: HashMap::new(),
            source: Source::default(),
            command: command.to_ascii_uppercase(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Value of a tag, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Whether a tag is present (with or without a value).
    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Last parameter.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Reference of the batch this line belongs to.
    pub fn batch_id(&self) -> Option<&str> {
        self.tag("batch")
    }

    /// `msgid` tag.
    pub fn msgid(&self) -> Option<&str> {
        self.tag("msgid")
    }

    /// Decoded `time` tag.
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        self.tag("time").and_then(parse_server_time)
    }

    /// Whether the command is a three-digit numeric reply.
    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s, "")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            let mut keys: Vec<&String> = self.tags.keys().collect();
            keys.sort();
            f.write_str("@")?;
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                f.write_str(key)?;
                let value = &self.tags[key];
                if !value.is_empty() {
                    f.write_str("=")?;
                    tags::escape_tag_value(f, value)?;
                }
            }
            f.write_str(" ")?;
        }
        if !self.source.name.is_empty() {
            write!(f, ":{} ", self.source)?;
        }
        f.write_str(&self.command)?;
        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {}", param)?;
            }
            if crate::encode::needs_colon_prefix(last) {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }
        Ok(())
    }
}
