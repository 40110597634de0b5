//! Channel records.

use chrono::{DateTime, Utc};

use crate::casemap::irc_eq;
use crate::isupport::PrefixSpec;

/// A channel member and their status symbols, highest rank first.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Member {
    pub nick: String,
    pub prefixes: String,
}

impl Member {
    pub fn new(nick: impl Into<String>, prefixes: impl Into<String>) -> Self {
        Member {
            nick: nick.into(),
            prefixes: prefixes.into(),
        }
    }

    /// Highest status symbol, if any.
    pub fn highest(&self) -> Option<char> {
        self.prefixes.chars().next()
    }
}

/// Channel topic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Topic {
    pub text: String,
    pub set_by: Option<String>,
    pub set_at: Option<DateTime<Utc>>,
}

/// Entry of a ban, exception or invite-exception list.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListEntry {
    pub mask: String,
    pub set_by: Option<String>,
    pub set_at: Option<DateTime<Utc>>,
}

/// Which moderation list a mode letter maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListMode {
    Ban,
    Exception,
    InviteException,
}

impl ListMode {
    pub fn from_char(mode: char) -> Option<Self> {
        match mode {
            'b' => Some(Self::Ban),
            'e' => Some(Self::Exception),
            'I' => Some(Self::InviteException),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Ban => 'b',
            Self::Exception => 'e',
            Self::InviteException => 'I',
        }
    }
}

/// One joined channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    pub name: String,
    pub topic: Option<Topic>,
    pub members: Vec<Member>,
    pub unread: u32,
    pub mentions: u32,
    pub bans: Vec<ListEntry>,
    pub exceptions: Vec<ListEntry>,
    pub invite_exceptions: Vec<ListEntry>,
    /// NAMES reply in progress.
    pub names_loading: bool,
    /// WHO reply in progress.
    pub who_loading: bool,
    /// NAMES entries collected until 366.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) pending_names: Vec<Member>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Channel {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn member(&self, nick: &str) -> Option<&Member> {
        self.members.iter().find(|m| irc_eq(&m.nick, nick))
    }

    pub fn has_member(&self, nick: &str) -> bool {
        self.member(nick).is_some()
    }

    /// Add a member, or update the prefixes of an existing one.
    pub fn upsert_member(&mut self, member: Member) {
        match self.members.iter_mut().find(|m| irc_eq(&m.nick, &member.nick)) {
            Some(existing) => {
                existing.nick = member.nick;
                existing.prefixes = member.prefixes;
            }
            None => self.members.push(member),
        }
    }

    /// Remove a member. Returns whether they were present.
    pub fn remove_member(&mut self, nick: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| !irc_eq(&m.nick, nick));
        self.members.len() != before
    }

    pub fn rename_member(&mut self, old: &str, new: &str) -> bool {
        match self.members.iter_mut().find(|m| irc_eq(&m.nick, old)) {
            Some(member) => {
                member.nick = new.to_string();
                true
            }
            None => false,
        }
    }

    /// Grant or revoke a status symbol, keeping symbols in rank order.
    pub fn set_member_status(&mut self, nick: &str, symbol: char, on: bool, spec: &PrefixSpec) {
        let Some(member) = self.members.iter_mut().find(|m| irc_eq(&m.nick, nick)) else {
            return;
        };
        let mut symbols: Vec<char> = member.prefixes.chars().filter(|&c| c != symbol).collect();
        if on {
            symbols.push(symbol);
        }
        symbols.sort_by_key(|c| spec.rank(*c).unwrap_or(usize::MAX));
        member.prefixes = symbols.into_iter().collect();
    }

    /// Moderation list for a list mode.
    pub fn list(&self, mode: ListMode) -> &[ListEntry] {
        match mode {
            ListMode::Ban => &self.bans,
            ListMode::Exception => &self.exceptions,
            ListMode::InviteException => &self.invite_exceptions,
        }
    }

    pub fn list_mut(&mut self, mode: ListMode) -> &mut Vec<ListEntry> {
        match mode {
            ListMode::Ban => &mut self.bans,
            ListMode::Exception => &mut self.exceptions,
            ListMode::InviteException => &mut self.invite_exceptions,
        }
    }

    /// Add a list entry unless the mask is already present.
    pub fn add_list_entry(&mut self, mode: ListMode, entry: ListEntry) {
        let list = self.list_mut(mode);
        if !list.iter().any(|e| e.mask == entry.mask) {
            list.push(entry);
        }
    }

    pub fn remove_list_entry(&mut self, mode: ListMode, mask: &str) {
        self.list_mut(mode).retain(|e| e.mask != mask);
    }

    /// Start collecting a NAMES reply.
    pub(crate) fn push_pending_name(&mut self, member: Member) {
        if !self.names_loading {
            self.names_loading = true;
            self.pending_names.clear();
        }
        match self
            .pending_names
            .iter_mut()
            .find(|m| irc_eq(&m.nick, &member.nick))
        {
            Some(existing) => existing.prefixes = member.prefixes,
            None => self.pending_names.push(member),
        }
    }

    /// Replace the member list with the collected NAMES reply.
    pub(crate) fn finish_names(&mut self) -> &[Member] {
        if self.names_loading {
            self.members = std::mem::take(&mut self.pending_names);
        }
        self.names_loading = false;
        &self.members
    }

    /// Local-only: clear unread and mention counters.
    pub fn mark_read(&mut self) {
        self.unread = 0;
        self.mentions = 0;
    }
}
