//! Per-command handlers.
//!
//! Each handler mutates [`SessionState`](crate::state::SessionState) and
//! records events and replies in the [`Output`]. Handlers never fail: a line
//! missing the parameters a handler needs is logged and ignored.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use super::{Output, SessionCore};
use crate::casemap::mentions;
use crate::encode::command as cmd;
use crate::encode::command::CHANNEL_CONTEXT_TAG;
use crate::event::{
    AccountChanged, AwayChanged, ChannelListEnd, ChannelListEntry, ChannelRenamed, Invited,
    Joined, Kicked, ListModeEntry, MessageKind, MessageReceived, MetadataFailed, MetadataValue,
    ModeChanged, MonitorOffline, MonitorOnline, NamesList, NickChanged, NicknameRejected,
    Parted, Registered, ReplyKind, ServerError, StandardReply, TagMessage, TopicChanged,
    UserQuit, WhoEnd, WhoReply, WhoisReply,
};
use crate::message::{Message, Source};
use crate::state::{ListEntry, ListMode, Member, Topic};

pub(super) type Handler = fn(&mut SessionCore, &Message, DateTime<Utc>, &mut Output);

/// Handler lookup by command token.
pub(super) fn table() -> &'static HashMap<&'static str, Handler> {
    static TABLE: OnceLock<HashMap<&'static str, Handler>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let entries: &[(&'static str, Handler)] = &[
            // Connection
            ("PING", handle_ping),
            ("PONG", handle_pong),
            ("ERROR", handle_error),
            ("001", handle_welcome),
            ("005", handle_isupport),
            ("432", handle_nick_rejected),
            ("433", handle_nick_rejected),
            ("436", handle_nick_rejected),
            // Membership
            ("JOIN", handle_join),
            ("PART", handle_part),
            ("KICK", handle_kick),
            ("QUIT", handle_quit),
            ("NICK", handle_nick),
            ("MODE", handle_mode),
            ("RENAME", handle_rename),
            ("353", handle_names_reply),
            ("366", handle_end_of_names),
            // Topic
            ("TOPIC", handle_topic),
            ("331", handle_no_topic),
            ("332", handle_topic_reply),
            ("333", handle_topic_who_time),
            // Messages
            ("PRIVMSG", handle_message),
            ("NOTICE", handle_message),
            ("TAGMSG", handle_tagmsg),
            ("INVITE", handle_invite),
            // User status
            ("AWAY", handle_away),
            ("305", handle_unaway),
            ("306", handle_now_away),
            ("ACCOUNT", handle_account),
            ("CHGHOST", handle_chghost),
            ("SETNAME", handle_setname),
            ("900", handle_logged_in),
            ("901", handle_logged_out),
            // Metadata
            ("METADATA", handle_metadata),
            ("761", handle_key_value),
            ("766", handle_key_not_set),
            ("764", handle_metadata_error),
            ("765", handle_metadata_error),
            ("767", handle_metadata_error),
            ("768", handle_metadata_error),
            ("769", handle_metadata_error),
            // Standard replies
            ("FAIL", handle_standard_reply),
            ("WARN", handle_standard_reply),
            ("NOTE", handle_standard_reply),
            ("SUCCESS", handle_standard_reply),
            // WHO / WHOIS
            ("352", handle_who_reply),
            ("315", handle_end_of_who),
            ("311", handle_whois),
            ("312", handle_whois),
            ("317", handle_whois),
            ("318", handle_whois),
            ("319", handle_whois),
            ("330", handle_whois),
            ("301", handle_whois),
            ("671", handle_whois),
            // LIST
            ("321", handle_list_start),
            ("322", handle_list_entry),
            ("323", handle_list_end),
            // MONITOR
            ("730", handle_monitor_online),
            ("731", handle_monitor_offline),
            // Moderation lists
            ("367", handle_list_mode_entry),
            ("348", handle_list_mode_entry),
            ("346", handle_list_mode_entry),
            ("368", handle_list_mode_end),
            ("349", handle_list_mode_end),
            ("347", handle_list_mode_end),
        ];
        entries.iter().copied().collect()
    })
}

fn owned(param: Option<&str>) -> Option<String> {
    param.map(str::to_string)
}

/// `*` means "none" in extended-join and ACCOUNT.
fn account_param(param: Option<&str>) -> Option<String> {
    param.filter(|a| *a != "*" && !a.is_empty()).map(str::to_string)
}

fn unix_time(param: Option<&str>) -> Option<DateTime<Utc>> {
    let secs = param?.parse::<i64>().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

// ============================================================================
// Connection
// ============================================================================

fn handle_ping(_: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    out.send(cmd::pong(msg.param(0).unwrap_or_default()));
}

fn handle_pong(_: &mut SessionCore, _: &Message, _: DateTime<Utc>, out: &mut Output) {
    out.pong = true;
}

fn handle_error(_: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    out.emit(ServerError {
        message: msg.param(0).unwrap_or_default().to_string(),
    });
}

fn handle_welcome(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let state = &mut core.state;
    if let Some(nick) = msg.param(0) {
        state.set_nickname(nick);
    }
    state.registered = true;
    out.registered = true;
    out.emit(Registered {
        nickname: state.nickname.clone(),
        server: msg.source.name.clone(),
    });
    for channel in state.channel_names() {
        out.send(cmd::join(&channel, None));
    }
}

fn handle_isupport(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, _: &mut Output) {
    core.state.support.apply(&msg.params);
}

fn handle_nick_rejected(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let nick = msg
        .param(1)
        .unwrap_or(core.state.nickname.as_str())
        .to_string();
    let retry = if !core.state.registered && !core.nick_retry_sent {
        core.nick_retry_sent = true;
        let retry = format!("{}_", nick);
        out.send(cmd::nick(&retry));
        core.state.set_nickname(&retry);
        Some(retry)
    } else {
        None
    };
    out.emit(NicknameRejected {
        nick,
        code: msg.command.clone(),
        reason: msg.trailing().unwrap_or_default().to_string(),
        retry,
    });
}

// ============================================================================
// Membership
// ============================================================================

fn handle_join(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let Some(channel) = msg.param(0) else {
        debug!("JOIN without channel");
        return;
    };
    let state = &mut core.state;
    let nick = msg.source.name.as_str();
    let is_self = state.is_self(nick);
    let extended = msg.params.len() >= 3;
    let account = if extended { account_param(msg.param(1)) } else { None };
    let realname = if extended { owned(msg.param(2)) } else { None };

    if is_self {
        let chan = state.ensure_channel(channel);
        chan.members.clear();
        state.current_user.username = msg.source.user.clone();
        state.current_user.host = msg.source.host.clone();
    }
    if let Some(chan) = state.channel_mut(channel) {
        chan.upsert_member(Member::new(nick, ""));
    }

    let user = state.ensure_user(nick);
    user.online = true;
    if msg.source.user.is_some() {
        user.username = msg.source.user.clone();
        user.host = msg.source.host.clone();
    }
    if extended {
        user.account = account.clone();
        user.realname = realname.clone();
    }

    out.emit(Joined {
        channel: channel.to_string(),
        source: msg.source.clone(),
        account,
        realname,
        is_self,
    });
}

fn handle_part(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let Some(channel) = msg.param(0) else {
        return;
    };
    let nick = msg.source.name.as_str();
    let is_self = core.state.is_self(nick);
    if is_self {
        core.state.remove_channel(channel);
    } else if let Some(chan) = core.state.channel_mut(channel) {
        chan.remove_member(nick);
    }
    out.emit(Parted {
        channel: channel.to_string(),
        nick: nick.to_string(),
        reason: owned(msg.param(1)),
        is_self,
    });
}

fn handle_kick(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let (Some(channel), Some(nick)) = (msg.param(0), msg.param(1)) else {
        return;
    };
    let is_self = core.state.is_self(nick);
    if is_self {
        core.state.remove_channel(channel);
    } else if let Some(chan) = core.state.channel_mut(channel) {
        chan.remove_member(nick);
    }
    out.emit(Kicked {
        channel: channel.to_string(),
        nick: nick.to_string(),
        by: msg.source.name.clone(),
        reason: owned(msg.param(2)),
        is_self,
    });
}

fn handle_quit(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let nick = msg.source.name.as_str();
    let channels = core.state.remove_member_everywhere(nick);
    if let Some(user) = core.state.user_mut(nick) {
        user.online = false;
    }
    out.emit(UserQuit {
        nick: nick.to_string(),
        reason: owned(msg.param(0)),
        channels,
    });
}

fn handle_nick(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let Some(new) = msg.param(0) else {
        return;
    };
    let old = msg.source.name.as_str();
    let is_self = core.state.is_self(old);
    core.state.rename_user(old, new);
    out.emit(NickChanged {
        old: old.to_string(),
        new: new.to_string(),
        is_self,
    });
}

fn handle_mode(core: &mut SessionCore, msg: &Message, now: DateTime<Utc>, out: &mut Output) {
    let (Some(target), Some(modes)) = (msg.param(0), msg.param(1)) else {
        return;
    };
    let args: Vec<String> = msg.params.iter().skip(2).cloned().collect();

    if core.state.is_channel(target) {
        let support = core.state.support.clone();
        if let Some(chan) = core.state.channel_mut(target) {
            let mut adding = true;
            let mut next_arg = args.iter();
            for mode in modes.chars() {
                match mode {
                    '+' => adding = true,
                    '-' => adding = false,
                    _ => {
                        let arg = if support.mode_takes_arg(mode, adding) {
                            next_arg.next()
                        } else {
                            None
                        };
                        let Some(arg) = arg else { continue };
                        if let Some(symbol) = support.prefix.symbol_for(mode) {
                            chan.set_member_status(arg, symbol, adding, &support.prefix);
                        } else if let Some(list) = ListMode::from_char(mode) {
                            if adding {
                                chan.add_list_entry(
                                    list,
                                    ListEntry {
                                        mask: arg.clone(),
                                        set_by: Some(msg.source.name.clone()),
                                        set_at: Some(now),
                                    },
                                );
                            } else {
                                chan.remove_list_entry(list, arg);
                            }
                        }
                    }
                }
            }
        }
    }

    out.emit(ModeChanged {
        target: target.to_string(),
        modes: modes.to_string(),
        args,
        set_by: msg.source.name.clone(),
    });
}

fn handle_rename(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let (Some(old), Some(new)) = (msg.param(0), msg.param(1)) else {
        return;
    };
    core.state.rename_channel(old, new);
    out.emit(ChannelRenamed {
        old: old.to_string(),
        new: new.to_string(),
        reason: owned(msg.param(2)),
    });
}

/// `353 <me> <symbol> <channel> :<entries>`
fn handle_names_reply(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, _: &mut Output) {
    let (Some(channel), Some(entries)) = (msg.param(2), msg.param(3)) else {
        return;
    };
    let mut members = Vec::new();
    for entry in entries.split_whitespace() {
        let (prefixes, rest) = core.state.support.split_prefixes(entry);
        let source = Source::parse(rest);
        if source.user.is_some() || source.host.is_some() {
            let user = core.state.ensure_user(&source.name);
            user.username = source.user.clone();
            user.host = source.host.clone();
        }
        members.push(Member::new(source.name, prefixes));
    }
    if let Some(chan) = core.state.channel_mut(channel) {
        for member in members {
            chan.push_pending_name(member);
        }
    }
}

/// `366 <me> <channel> :End of /NAMES list`
fn handle_end_of_names(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let Some(channel) = msg.param(1) else {
        return;
    };
    if let Some(chan) = core.state.channel_mut(channel) {
        let members = chan.finish_names().to_vec();
        out.emit(NamesList {
            channel: chan.name.clone(),
            members,
        });
    }
}

// ============================================================================
// Topic
// ============================================================================

fn set_topic(
    core: &mut SessionCore,
    channel: &str,
    topic: Option<Topic>,
    out: &mut Output,
) {
    if let Some(chan) = core.state.channel_mut(channel) {
        chan.topic = topic.clone();
    }
    out.emit(TopicChanged {
        channel: channel.to_string(),
        topic: topic.as_ref().map(|t| t.text.clone()),
        set_by: topic.as_ref().and_then(|t| t.set_by.clone()),
        set_at: topic.and_then(|t| t.set_at),
    });
}

fn handle_topic(core: &mut SessionCore, msg: &Message, now: DateTime<Utc>, out: &mut Output) {
    let Some(channel) = msg.param(0) else {
        return;
    };
    let text = msg.param(1).unwrap_or_default();
    let topic = (!text.is_empty()).then(|| Topic {
        text: text.to_string(),
        set_by: Some(msg.source.name.clone()),
        set_at: Some(msg.server_time().unwrap_or(now)),
    });
    set_topic(core, channel, topic, out);
}

fn handle_no_topic(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    if let Some(channel) = msg.param(1) {
        set_topic(core, channel, None, out);
    }
}

fn handle_topic_reply(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let (Some(channel), Some(text)) = (msg.param(1), msg.param(2)) else {
        return;
    };
    let previous = core.state.channel(channel).and_then(|c| c.topic.clone());
    let topic = Topic {
        text: text.to_string(),
        set_by: previous.as_ref().and_then(|t| t.set_by.clone()),
        set_at: previous.and_then(|t| t.set_at),
    };
    set_topic(core, channel, Some(topic), out);
}

/// `333 <me> <channel> <setter> <unix time>`
fn handle_topic_who_time(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let Some(channel) = msg.param(1) else {
        return;
    };
    let text = core
        .state
        .channel(channel)
        .and_then(|c| c.topic.as_ref())
        .map(|t| t.text.clone())
        .unwrap_or_default();
    let topic = Topic {
        text,
        set_by: owned(msg.param(2)).map(|s| Source::parse(&s).name),
        set_at: unix_time(msg.param(3)),
    };
    set_topic(core, channel, Some(topic), out);
}

// ============================================================================
// Messages
// ============================================================================

fn handle_message(core: &mut SessionCore, msg: &Message, now: DateTime<Utc>, out: &mut Output) {
    let Some(target) = msg.param(0) else {
        return;
    };
    let text = msg.param(1).unwrap_or_default();
    let sender = msg.source.name.as_str();
    let is_self = core.state.is_self(sender);
    let context = msg.tag(CHANNEL_CONTEXT_TAG).map(str::to_string);

    let kind = if msg.command == "NOTICE" {
        MessageKind::Notice
    } else if core.state.is_channel(target) {
        MessageKind::Channel
    } else if context.is_some() {
        MessageKind::Whisper
    } else {
        MessageKind::Private
    };
    let mention = !is_self && mentions(text, &core.state.nickname);

    core.count_unread(target, sender, text);

    out.emit(MessageReceived {
        kind,
        source: msg.source.clone(),
        target: target.to_string(),
        text: text.to_string(),
        msgid: owned(msg.msgid()),
        time: msg.server_time().unwrap_or(now),
        context,
        mention,
        is_self,
        tags: msg.tags.clone(),
    });
}

fn handle_tagmsg(_: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let Some(target) = msg.param(0) else {
        return;
    };
    out.emit(TagMessage {
        source: msg.source.clone(),
        target: target.to_string(),
        tags: msg.tags.clone(),
    });
}

/// `:inviter INVITE <target> <channel>`
fn handle_invite(_: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let (Some(target), Some(channel)) = (msg.param(0), msg.param(1)) else {
        return;
    };
    out.emit(Invited {
        channel: channel.to_string(),
        by: msg.source.name.clone(),
        target: target.to_string(),
    });
}

// ============================================================================
// User status
// ============================================================================

fn handle_away(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let nick = msg.source.name.as_str();
    let message = owned(msg.param(0)).filter(|m| !m.is_empty());
    core.state.ensure_user(nick).set_away(message.clone());
    if core.state.is_self(nick) {
        core.state.current_user.set_away(message.clone());
    }
    out.emit(AwayChanged {
        nick: nick.to_string(),
        message,
    });
}

fn handle_unaway(core: &mut SessionCore, _: &Message, _: DateTime<Utc>, _: &mut Output) {
    core.state.current_user.set_away(None);
}

fn handle_now_away(core: &mut SessionCore, _: &Message, _: DateTime<Utc>, _: &mut Output) {
    core.state.current_user.away = true;
}

fn handle_account(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let nick = msg.source.name.as_str();
    let account = account_param(msg.param(0));
    core.state.ensure_user(nick).account = account.clone();
    if core.state.is_self(nick) {
        core.state.current_user.account = account.clone();
    }
    out.emit(AccountChanged {
        nick: nick.to_string(),
        account,
    });
}

fn handle_chghost(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, _: &mut Output) {
    let (Some(username), Some(host)) = (msg.param(0), msg.param(1)) else {
        return;
    };
    let nick = msg.source.name.as_str();
    let user = core.state.ensure_user(nick);
    user.username = Some(username.to_string());
    user.host = Some(host.to_string());
    if core.state.is_self(nick) {
        core.state.current_user.username = Some(username.to_string());
        core.state.current_user.host = Some(host.to_string());
    }
}

fn handle_setname(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, _: &mut Output) {
    let Some(realname) = msg.param(0) else {
        return;
    };
    let nick = msg.source.name.as_str();
    core.state.ensure_user(nick).realname = Some(realname.to_string());
    if core.state.is_self(nick) {
        core.state.current_user.realname = Some(realname.to_string());
    }
}

/// `900 <me> <mask> <account> :You are now logged in as <account>`
fn handle_logged_in(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let account = account_param(msg.param(2));
    core.state.current_user.account = account.clone();
    out.emit(AccountChanged {
        nick: core.state.nickname.clone(),
        account,
    });
}

fn handle_logged_out(core: &mut SessionCore, _: &Message, _: DateTime<Utc>, out: &mut Output) {
    core.state.current_user.account = None;
    out.emit(AccountChanged {
        nick: core.state.nickname.clone(),
        account: None,
    });
}

// ============================================================================
// Metadata
// ============================================================================

fn store_metadata(
    core: &mut SessionCore,
    target: &str,
    key: &str,
    value: Option<String>,
    visibility: Option<String>,
) {
    if target == "*" || core.state.is_self(target) {
        core.state
            .current_user
            .set_metadata(key, value, visibility);
    } else if !core.state.is_channel(target) {
        core.state
            .ensure_user(target)
            .set_metadata(key, value, visibility);
    }
}

fn emit_metadata(core: &mut SessionCore, params: &[String], out: &mut Output) {
    let (Some(target), Some(key)) = (params.first(), params.get(1)) else {
        return;
    };
    let visibility = params.get(2).cloned();
    let value = params.get(3).cloned();
    store_metadata(core, target, key, value.clone(), visibility.clone());
    out.emit(MetadataValue {
        target: target.clone(),
        key: key.clone(),
        visibility,
        value,
    });
}

/// `:server METADATA <target> <key> <visibility> [:<value>]`
fn handle_metadata(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    emit_metadata(core, &msg.params, out);
}

/// `761 <me> <target> <key> <visibility> :<value>`
fn handle_key_value(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    emit_metadata(core, msg.params.get(1..).unwrap_or_default(), out);
}

/// `766 <me> <target> <key> :key not set`
fn handle_key_not_set(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let (Some(target), Some(key)) = (msg.param(1), msg.param(2)) else {
        return;
    };
    store_metadata(core, target, key, None, None);
    out.emit(MetadataValue {
        target: target.to_string(),
        key: key.to_string(),
        visibility: None,
        value: None,
    });
}

/// Numeric metadata errors: `<me> <target> [<key>] :<message>`.
fn handle_metadata_error(_: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let middle = msg.params.len().saturating_sub(1);
    out.emit(MetadataFailed {
        code: msg.command.clone(),
        target: msg.params.get(1).filter(|_| middle > 1).cloned(),
        key: msg.params.get(2).filter(|_| middle > 2).cloned(),
        message: msg.trailing().unwrap_or_default().to_string(),
    });
}

// ============================================================================
// Standard replies
// ============================================================================

/// `FAIL <command> <code> [<context>...] :<description>`
fn handle_standard_reply(_: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let kind = match msg.command.as_str() {
        "FAIL" => ReplyKind::Fail,
        "WARN" => ReplyKind::Warn,
        "NOTE" => ReplyKind::Note,
        _ => ReplyKind::Success,
    };
    let (Some(command), Some(code)) = (msg.param(0), msg.param(1)) else {
        return;
    };
    let context: Vec<String> = match msg.params.len() {
        0..=3 => Vec::new(),
        n => msg.params[2..n - 1].to_vec(),
    };
    let description = if msg.params.len() > 2 {
        msg.trailing().unwrap_or_default().to_string()
    } else {
        String::new()
    };

    if kind == ReplyKind::Fail && command == "METADATA" {
        let (target, key) = match context.as_slice() {
            [target, key, ..] => (Some(target.clone()), Some(key.clone())),
            [only] if code.starts_with("KEY") => (None, Some(only.clone())),
            [only] => (Some(only.clone()), None),
            [] => (None, None),
        };
        out.emit(MetadataFailed {
            code: code.to_string(),
            target,
            key,
            message: description.clone(),
        });
    }

    out.emit(StandardReply {
        kind,
        command: command.to_string(),
        code: code.to_string(),
        context,
        description,
    });
}

// ============================================================================
// WHO / WHOIS
// ============================================================================

/// `352 <me> <channel> <user> <host> <server> <nick> <flags> :<hops> <realname>`
fn handle_who_reply(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    if msg.params.len() < 8 {
        debug!(params = msg.params.len(), "short WHO reply");
        return;
    }
    let p = |i: usize| msg.params[i].clone();
    let realname = msg.params[7]
        .split_once(' ')
        .map_or("", |(_, name)| name)
        .to_string();
    let reply = WhoReply {
        channel: p(1),
        username: p(2),
        host: p(3),
        server: p(4),
        nick: p(5),
        flags: p(6),
        realname,
    };

    let user = core.state.ensure_user(&reply.nick);
    user.username = Some(reply.username.clone());
    user.host = Some(reply.host.clone());
    user.realname = Some(reply.realname.clone());
    user.away = reply.flags.starts_with('G');
    if let Some(chan) = core.state.channel_mut(&reply.channel) {
        chan.who_loading = true;
    }
    out.emit(reply);
}

fn handle_end_of_who(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let mask = msg.param(1).unwrap_or_default().to_string();
    if let Some(chan) = core.state.channel_mut(&mask) {
        chan.who_loading = false;
    }
    out.emit(WhoEnd { mask });
}

fn handle_whois(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let Some(nick) = msg.param(1) else {
        return;
    };
    let info: Vec<String> = msg.params.iter().skip(2).cloned().collect();
    match msg.command.as_str() {
        // 311 <me> <nick> <user> <host> * :<realname>
        "311" if info.len() >= 4 => {
            let user = core.state.ensure_user(nick);
            user.username = Some(info[0].clone());
            user.host = Some(info[1].clone());
            user.realname = info.last().cloned();
        }
        // 330 <me> <nick> <account> :is logged in as
        "330" => {
            if let Some(account) = info.first() {
                core.state.ensure_user(nick).account = Some(account.clone());
            }
        }
        // 301 <me> <nick> :<away message>
        "301" => {
            core.state.ensure_user(nick).set_away(info.last().cloned());
        }
        _ => {}
    }
    out.emit(WhoisReply {
        nick: nick.to_string(),
        numeric: msg.command.clone(),
        info,
    });
}

// ============================================================================
// LIST
// ============================================================================

fn handle_list_start(_: &mut SessionCore, _: &Message, _: DateTime<Utc>, _: &mut Output) {}

/// `322 <me> <channel> <users> :<topic>`
fn handle_list_entry(_: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let Some(channel) = msg.param(1) else {
        return;
    };
    out.emit(ChannelListEntry {
        channel: channel.to_string(),
        users: msg.param(2).and_then(|n| n.parse().ok()).unwrap_or(0),
        topic: msg.param(3).unwrap_or_default().to_string(),
    });
}

fn handle_list_end(_: &mut SessionCore, _: &Message, _: DateTime<Utc>, out: &mut Output) {
    out.emit(ChannelListEnd);
}

// ============================================================================
// MONITOR
// ============================================================================

/// `730 <me> :nick!user@host,...`
fn handle_monitor_online(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let targets: Vec<Source> = msg
        .trailing()
        .unwrap_or_default()
        .split(',')
        .filter(|t| !t.is_empty())
        .map(Source::parse)
        .collect();
    for target in &targets {
        let user = core.state.ensure_user(&target.name);
        user.online = true;
        if target.user.is_some() {
            user.username = target.user.clone();
            user.host = target.host.clone();
        }
    }
    out.emit(MonitorOnline { targets });
}

/// `731 <me> :nick,...`
fn handle_monitor_offline(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let nicks: Vec<String> = msg
        .trailing()
        .unwrap_or_default()
        .split(',')
        .filter(|t| !t.is_empty())
        .map(|t| Source::parse(t).name)
        .collect();
    for nick in &nicks {
        core.state.ensure_user(nick).online = false;
    }
    out.emit(MonitorOffline { nicks });
}

// ============================================================================
// Moderation lists
// ============================================================================

fn list_mode_for(numeric: &str) -> Option<ListMode> {
    match numeric {
        "367" | "368" => Some(ListMode::Ban),
        "348" | "349" => Some(ListMode::Exception),
        "346" | "347" => Some(ListMode::InviteException),
        _ => None,
    }
}

/// `367 <me> <channel> <mask> [<setter> <time>]`
fn handle_list_mode_entry(core: &mut SessionCore, msg: &Message, _: DateTime<Utc>, out: &mut Output) {
    let (Some(list), Some(channel), Some(mask)) =
        (list_mode_for(&msg.command), msg.param(1), msg.param(2))
    else {
        return;
    };
    let entry = ListEntry {
        mask: mask.to_string(),
        set_by: owned(msg.param(3)),
        set_at: unix_time(msg.param(4)),
    };
    if let Some(chan) = core.state.channel_mut(channel) {
        chan.add_list_entry(list, entry.clone());
    }
    out.emit(ListModeEntry {
        channel: channel.to_string(),
        mode: list.as_char(),
        mask: entry.mask,
        set_by: entry.set_by,
        set_at: entry.set_at,
    });
}

fn handle_list_mode_end(_: &mut SessionCore, msg: &Message, _: DateTime<Utc>, _: &mut Output) {
    debug!(numeric = %msg.command, channel = msg.param(1), "end of list mode reply");
}
