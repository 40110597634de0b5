//! Per-session state store.
//!
//! Channels, users, the current user and the negotiated capability set of
//! one session. Only the session pipeline mutates it; everyone else reads
//! snapshots. Channel and user keys are folded with [`irc_to_lower`].

mod channel;
mod user;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::caps::Capabilities;
use crate::casemap::{irc_eq, irc_to_lower};
use crate::isupport::ServerSupport;

pub use self::channel::{Channel, ListEntry, ListMode, Member, Topic};
pub use self::user::{MetadataEntry, User};

/// Transport-level state of a session.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Disconnected
///       ^                                         |
///       +---- Connecting <- Reconnecting <--------+
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    #[default]
    Disconnected,
}

impl ConnectionState {
    /// Whether moving to `next` is a legal step of the state machine.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Disconnected, Reconnecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Reconnecting, Connecting)
                | (Reconnecting, Disconnected)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a session knows about its server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionState {
    /// Configured server name; the source of lines that carry none.
    pub server_name: String,
    /// Our current nickname.
    pub nickname: String,
    /// Our own account, away status and metadata.
    pub current_user: User,
    /// `001` seen on the current connection.
    pub registered: bool,
    pub caps: Capabilities,
    pub support: ServerSupport,
    channels: BTreeMap<String, Channel>,
    users: HashMap<String, User>,
}

impl SessionState {
    pub fn new(server_name: impl Into<String>, nickname: impl Into<String>) -> Self {
        let nickname = nickname.into();
        SessionState {
            server_name: server_name.into(),
            current_user: User::new(nickname.clone()),
            nickname,
            ..Default::default()
        }
    }

    /// Whether `nick` is us.
    pub fn is_self(&self, nick: &str) -> bool {
        irc_eq(&self.nickname, nick)
    }

    /// Whether `target` names a channel on this server.
    pub fn is_channel(&self, target: &str) -> bool {
        self.support.is_channel(target)
    }

    pub fn set_nickname(&mut self, nick: &str) {
        self.nickname = nick.to_string();
        self.current_user.nick = nick.to_string();
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&irc_to_lower(name))
    }

    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(&irc_to_lower(name))
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Names of every channel, as the server spelled them.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.values().map(|c| c.name.clone()).collect()
    }

    /// Get or create a channel.
    pub fn ensure_channel(&mut self, name: &str) -> &mut Channel {
        self.channels
            .entry(irc_to_lower(name))
            .or_insert_with(|| Channel::new(name))
    }

    pub fn remove_channel(&mut self, name: &str) -> Option<Channel> {
        self.channels.remove(&irc_to_lower(name))
    }

    /// Re-key a channel after `RENAME`.
    pub fn rename_channel(&mut self, old: &str, new: &str) -> bool {
        match self.channels.remove(&irc_to_lower(old)) {
            Some(mut channel) => {
                channel.name = new.to_string();
                self.channels.insert(irc_to_lower(new), channel);
                true
            }
            None => false,
        }
    }

    pub fn user(&self, nick: &str) -> Option<&User> {
        self.users.get(&irc_to_lower(nick))
    }

    pub fn user_mut(&mut self, nick: &str) -> Option<&mut User> {
        self.users.get_mut(&irc_to_lower(nick))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Get or create a user record.
    pub fn ensure_user(&mut self, nick: &str) -> &mut User {
        self.users
            .entry(irc_to_lower(nick))
            .or_insert_with(|| User::new(nick))
    }

    /// Follow a nick change through users and channel memberships.
    pub fn rename_user(&mut self, old: &str, new: &str) {
        if let Some(mut user) = self.users.remove(&irc_to_lower(old)) {
            user.nick = new.to_string();
            self.users.insert(irc_to_lower(new), user);
        }
        for channel in self.channels.values_mut() {
            channel.rename_member(old, new);
        }
        if self.is_self(old) {
            self.set_nickname(new);
        }
    }

    /// Remove `nick` from every channel. Returns the channels they were in.
    pub fn remove_member_everywhere(&mut self, nick: &str) -> Vec<String> {
        self.channels
            .values_mut()
            .filter_map(|c| c.remove_member(nick).then(|| c.name.clone()))
            .collect()
    }

    /// Whether `nick` shares any channel with us.
    pub fn shares_channel(&self, nick: &str) -> bool {
        self.channels.values().any(|c| c.has_member(nick))
    }

    /// Reset per-connection data while keeping the channel list for rejoining.
    pub fn prepare_reconnect(&mut self) {
        self.registered = false;
        self.caps.clear();
        for channel in self.channels.values_mut() {
            channel.members.clear();
            channel.names_loading = false;
            channel.who_loading = false;
            channel.pending_names.clear();
        }
        for user in self.users.values_mut() {
            user.online = false;
        }
    }
}
