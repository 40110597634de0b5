//! IRCv3 capability bookkeeping for the client side of negotiation.
//!
//! Tracks what the server offered, what was requested and what was
//! acknowledged, and splits `CAP REQ` payloads into batches that fit
//! on one line.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>

use std::collections::{BTreeMap, BTreeSet};

/// Byte budget for the capability list of one `CAP REQ` line.
///
/// Leaves headroom under the 512-byte line limit for the server's
/// `:server CAP nick ACK :` echo.
pub const CAP_REQ_BUDGET: usize = 400;

/// Known IRCv3 capability types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Show all user prefix modes in NAMES
    MultiPrefix,
    /// SASL authentication
    Sasl,
    /// Notify of account login/logout
    AccountNotify,
    /// Notify of away status changes
    AwayNotify,
    /// Extended JOIN with account and realname
    ExtendedJoin,
    /// Add account tag to messages
    AccountTag,
    /// Message batching
    Batch,
    /// Notify of capability changes
    CapNotify,
    /// Notify of hostname changes
    ChgHost,
    /// Echo messages back to sender
    EchoMessage,
    /// Notify of channel invites
    InviteNotify,
    /// Server-time message tags
    ServerTime,
    /// Full nick!user@host in NAMES
    UserhostInNames,
    /// SETNAME command for changing realname
    SetName,
    /// Client message tags support
    MessageTags,
    /// Label request/response correlation
    LabeledResponse,
    /// FAIL/WARN/NOTE standard replies
    StandardReplies,
    /// Multi-line messages delivered as a batch
    Multiline,
    /// User and channel metadata
    Metadata,
    /// Account registration via REGISTER/VERIFY
    AccountRegistration,
    /// MONITOR extended to away/account changes
    ExtendedMonitor,
    /// RENAME for channels
    ChannelRename,
    /// Message deletion by msgid
    MessageRedaction,
    /// Unknown/custom capability
    Custom(String),
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::MultiPrefix => "multi-prefix",
            Self::Sasl => "sasl",
            Self::AccountNotify => "account-notify",
            Self::AwayNotify => "away-notify",
            Self::ExtendedJoin => "extended-join",
            Self::AccountTag => "account-tag",
            Self::Batch => "batch",
            Self::CapNotify => "cap-notify",
            Self::ChgHost => "chghost",
            Self::EchoMessage => "echo-message",
            Self::InviteNotify => "invite-notify",
            Self::ServerTime => "server-time",
            Self::UserhostInNames => "userhost-in-names",
            Self::SetName => "setname",
            Self::MessageTags => "message-tags",
            Self::LabeledResponse => "labeled-response",
            Self::StandardReplies => "standard-replies",
            Self::Multiline => "draft/multiline",
            Self::Metadata => "draft/metadata-2",
            Self::AccountRegistration => "draft/account-registration",
            Self::ExtendedMonitor => "extended-monitor",
            Self::ChannelRename => "draft/channel-rename",
            Self::MessageRedaction => "draft/message-redaction",
            Self::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "multi-prefix" => Self::MultiPrefix,
            "sasl" => Self::Sasl,
            "account-notify" => Self::AccountNotify,
            "away-notify" => Self::AwayNotify,
            "extended-join" => Self::ExtendedJoin,
            "account-tag" => Self::AccountTag,
            "batch" => Self::Batch,
            "cap-notify" => Self::CapNotify,
            "chghost" => Self::ChgHost,
            "echo-message" => Self::EchoMessage,
            "invite-notify" => Self::InviteNotify,
            "server-time" => Self::ServerTime,
            "userhost-in-names" => Self::UserhostInNames,
            "setname" => Self::SetName,
            "message-tags" => Self::MessageTags,
            "labeled-response" => Self::LabeledResponse,
            "standard-replies" => Self::StandardReplies,
            "draft/multiline" => Self::Multiline,
            "draft/metadata-2" => Self::Metadata,
            "draft/account-registration" => Self::AccountRegistration,
            "extended-monitor" => Self::ExtendedMonitor,
            "draft/channel-rename" => Self::ChannelRename,
            "draft/message-redaction" => Self::MessageRedaction,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Capabilities requested when the configuration does not name any.
pub fn default_capabilities() -> Vec<Capability> {
    vec![
        Capability::MultiPrefix,
        Capability::Sasl,
        Capability::AccountNotify,
        Capability::AwayNotify,
        Capability::ExtendedJoin,
        Capability::AccountTag,
        Capability::Batch,
        Capability::CapNotify,
        Capability::ChgHost,
        Capability::EchoMessage,
        Capability::InviteNotify,
        Capability::ServerTime,
        Capability::UserhostInNames,
        Capability::SetName,
        Capability::MessageTags,
        Capability::StandardReplies,
        Capability::Multiline,
        Capability::Metadata,
        Capability::AccountRegistration,
        Capability::ExtendedMonitor,
        Capability::ChannelRename,
        Capability::MessageRedaction,
    ]
}

/// Split a space-separated capability list into `(name, value)` pairs.
///
/// `sasl=PLAIN,EXTERNAL` yields `("sasl", Some("PLAIN,EXTERNAL"))`.
pub fn parse_cap_list(list: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    list.split(' ')
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (token, None),
        })
}

/// Pack capability names into space-separated lists of at most `budget` bytes.
///
/// A single name longer than the budget gets a list of its own.
pub fn request_batches<S: AsRef<str>>(caps: &[S], budget: usize) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();

    for cap in caps {
        let cap = cap.as_ref();
        let needed = if current.is_empty() {
            cap.len()
        } else {
            current.len() + 1 + cap.len()
        };
        if needed > budget && !current.is_empty() {
            batches.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(cap);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Capability state of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capabilities {
    /// Offered by the server, with values (`sasl=PLAIN`, `draft/multiline=max-bytes=4096`).
    pub offered: BTreeMap<String, Option<String>>,
    /// Sent in `CAP REQ`.
    pub requested: BTreeSet<String>,
    /// Acknowledged by the server. Always a subset of `requested`.
    pub acknowledged: BTreeSet<String>,
}

impl Capabilities {
    /// Whether `cap` was acknowledged.
    pub fn is_enabled(&self, cap: impl AsRef<str>) -> bool {
        self.acknowledged.contains(cap.as_ref())
    }

    /// Value the server advertised for `cap`.
    pub fn value(&self, cap: impl AsRef<str>) -> Option<&str> {
        self.offered.get(cap.as_ref()).and_then(|v| v.as_deref())
    }

    /// Record offered capabilities from an `LS` chunk or `NEW`. Returns the names added.
    pub fn offer(&mut self, list: &str) -> Vec<String> {
        parse_cap_list(list)
            .map(|(name, value)| {
                self.offered
                    .insert(name.to_string(), value.map(str::to_string));
                name.to_string()
            })
            .collect()
    }

    /// Drop capabilities named by `DEL`. Returns the names removed.
    pub fn withdraw(&mut self, list: &str) -> Vec<String> {
        parse_cap_list(list)
            .filter_map(|(name, _)| {
                let was_offered = self.offered.remove(name).is_some();
                let was_enabled = self.acknowledged.remove(name);
                (was_offered || was_enabled).then(|| name.to_string())
            })
            .collect()
    }

    /// Apply an `ACK` list. `-cap` disables; unrequested names are ignored.
    /// Returns the names that changed.
    pub fn acknowledge(&mut self, list: &str) -> Vec<String> {
        let mut changed = Vec::new();
        for (token, _) in parse_cap_list(list) {
            if let Some(name) = token.strip_prefix('-') {
                if self.acknowledged.remove(name) {
                    changed.push(token.to_string());
                }
            } else if self.requested.contains(token) && self.acknowledged.insert(token.to_string())
            {
                changed.push(token.to_string());
            }
        }
        changed
    }

    /// SASL mechanisms advertised through the `sasl=` value.
    pub fn sasl_mechanisms(&self) -> Vec<String> {
        self.value("sasl")
            .map(|v| v.split(',').filter(|m| !m.is_empty()).map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Forget everything (new connection).
    pub fn clear(&mut self) {
        self.offered.clear();
        self.requested.clear();
        self.acknowledged.clear();
    }
}
