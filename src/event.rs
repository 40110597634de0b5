//! Typed events published by client sessions.
//!
//! Every event kind is a variant of the closed [`Event`] enum and carries
//! its own payload struct. [`EventKind`] names the variants without data
//! and is what subscriptions are keyed on; [`EventPayload`] ties a payload
//! type back to its kind for typed subscriptions.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::message::Source;
use crate::state::{ConnectionState, Member};

/// Opaque identity of a client session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        SessionId(raw)
    }

    /// Raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Implemented by every event payload struct.
pub trait EventPayload: Sized + 'static {
    /// The kind this payload is published under.
    const KIND: EventKind;

    /// Borrow the payload out of an event of the matching kind.
    fn from_event(event: &Event) -> Option<&Self>;
}

macro_rules! events {
    ($( $(#[$meta:meta])* $variant:ident($payload:ident) ),* $(,)?) => {
        /// A notification produced by a session.
        #[derive(Debug, Clone, PartialEq)]
        #[non_exhaustive]
        #[allow(clippy::large_enum_variant)]
        pub enum Event {
            $( $(#[$meta])* $variant($payload), )*
        }

        /// Payload-free discriminant of [`Event`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[non_exhaustive]
        pub enum EventKind {
            $( $(#[$meta])* $variant, )*
        }

        impl Event {
            /// The kind of this event.
            pub fn kind(&self) -> EventKind {
                match self {
                    $( Event::$variant(_) => EventKind::$variant, )*
                }
            }
        }

        impl EventKind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [EventKind] = &[ $( EventKind::$variant, )* ];

            /// Stable name of the kind.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( EventKind::$variant => stringify!($variant), )*
                }
            }
        }

        $(
            impl EventPayload for $payload {
                const KIND: EventKind = EventKind::$variant;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(payload) => Some(payload),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl From<$payload> for Event {
                fn from(payload: $payload) -> Self {
                    Event::$variant(payload)
                }
            }
        )*
    };
}

events! {
    /// Connection state machine moved.
    ConnectionStateChanged(ConnectionStateChanged),
    /// `001` received; the session is usable.
    Registered(Registered),
    /// PRIVMSG or NOTICE.
    Message(MessageReceived),
    /// Reassembled `draft/multiline` batch.
    MultilineMessage(MultilineMessage),
    /// TAGMSG (typing notifications, reactions).
    TagMessage(TagMessage),
    Join(Joined),
    Part(Parted),
    Kick(Kicked),
    Quit(UserQuit),
    NickChange(NickChanged),
    ModeChange(ModeChanged),
    TopicChange(TopicChanged),
    /// Complete NAMES reply for a channel.
    Names(NamesList),
    CapAcknowledged(CapAcknowledged),
    CapRejected(CapRejected),
    /// `CAP NEW` / `CAP DEL`.
    CapabilitiesChanged(CapabilitiesChanged),
    /// SASL finished, successfully or not.
    Authentication(AuthenticationResult),
    AccountChange(AccountChanged),
    AwayChange(AwayChanged),
    Invite(Invited),
    MetadataValue(MetadataValue),
    MetadataFailed(MetadataFailed),
    /// FAIL / WARN / NOTE / SUCCESS.
    StandardReply(StandardReply),
    WhoReply(WhoReply),
    WhoEnd(WhoEnd),
    WhoisReply(WhoisReply),
    ChannelListEntry(ChannelListEntry),
    ChannelListEnd(ChannelListEnd),
    ListModeEntry(ListModeEntry),
    MonitorOnline(MonitorOnline),
    MonitorOffline(MonitorOffline),
    ChannelRenamed(ChannelRenamed),
    /// 432 / 433 / 436, with the automatic retry if one was sent.
    NicknameRejected(NicknameRejected),
    /// Numeric error reply without a dedicated event.
    ErrorReply(ErrorReply),
    /// `ERROR` from the server.
    ServerError(ServerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStateChanged {
    pub previous: ConnectionState,
    pub current: ConnectionState,
    /// Why the transition happened, when there is something to say.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub nickname: String,
    pub server: String,
}

/// How a PRIVMSG/NOTICE was addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageKind {
    /// Sent to a channel.
    Channel,
    /// Sent to us directly.
    Private,
    /// NOTICE to a channel or to us.
    Notice,
    /// Private message carrying a `+draft/channel-context` tag.
    Whisper,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageReceived {
    pub kind: MessageKind,
    pub source: Source,
    pub target: String,
    pub text: String,
    pub msgid: Option<String>,
    pub time: DateTime<Utc>,
    /// Channel named by `+draft/channel-context`, for whispers.
    pub context: Option<String>,
    /// The text mentions our nickname.
    pub mention: bool,
    /// We sent it (echo-message).
    pub is_self: bool,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultilineMessage {
    pub batch_id: String,
    pub source: Source,
    pub target: String,
    /// Member bodies joined with `\n`, or directly for concat members.
    pub body: String,
    /// `msgid` of every member, in arrival order.
    pub message_ids: Vec<String>,
    pub time: DateTime<Utc>,
    /// Members were NOTICEs.
    pub notice: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMessage {
    pub source: Source,
    pub target: String,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub channel: String,
    pub source: Source,
    /// From extended-join.
    pub account: Option<String>,
    /// From extended-join.
    pub realname: Option<String>,
    pub is_self: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parted {
    pub channel: String,
    pub nick: String,
    pub reason: Option<String>,
    pub is_self: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kicked {
    pub channel: String,
    pub nick: String,
    pub by: String,
    pub reason: Option<String>,
    pub is_self: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuit {
    pub nick: String,
    pub reason: Option<String>,
    /// Channels the user was removed from.
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NickChanged {
    pub old: String,
    pub new: String,
    pub is_self: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChanged {
    pub target: String,
    pub modes: String,
    pub args: Vec<String>,
    pub set_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicChanged {
    pub channel: String,
    pub topic: Option<String>,
    pub set_by: Option<String>,
    pub set_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamesList {
    pub channel: String,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapAcknowledged {
    pub caps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapRejected {
    pub caps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitiesChanged {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub success: bool,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountChanged {
    pub nick: String,
    pub account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwayChanged {
    pub nick: String,
    /// `None` when the user came back.
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invited {
    pub channel: String,
    pub by: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataValue {
    pub target: String,
    pub key: String,
    pub visibility: Option<String>,
    /// `None` when the key is not set or was removed.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFailed {
    /// Standard-reply code or numeric.
    pub code: String,
    pub target: Option<String>,
    pub key: Option<String>,
    pub message: String,
}

/// Standard reply severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Fail,
    Warn,
    Note,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardReply {
    pub kind: ReplyKind,
    pub command: String,
    pub code: String,
    pub context: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoReply {
    pub channel: String,
    pub username: String,
    pub host: String,
    pub server: String,
    pub nick: String,
    pub flags: String,
    pub realname: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoEnd {
    pub mask: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoisReply {
    pub nick: String,
    pub numeric: String,
    /// Parameters after the nickname.
    pub info: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelListEntry {
    pub channel: String,
    pub users: u32,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelListEnd;

/// One entry of a ban, exception or invite-exception list reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListModeEntry {
    pub channel: String,
    pub mode: char,
    pub mask: String,
    pub set_by: Option<String>,
    pub set_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOnline {
    pub targets: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOffline {
    pub nicks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRenamed {
    pub old: String,
    pub new: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicknameRejected {
    pub nick: String,
    pub code: String,
    pub reason: String,
    /// Nickname sent automatically in response, if any.
    pub retry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    pub code: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub message: String,
}
