//! One builder per outbound operation.
//!
//! Builders that can only ever produce one line return `String`; builders
//! whose output depends on payload length or capabilities return
//! `Vec<String>`.

use crate::ircv3::batch::{generate_batch_ref, MULTILINE_CONCAT_TAG};
use crate::state::ListMode;
use crate::util::split_message;

use super::{
    payload_budget, sanitize_raw, write_cmd, write_cmd_freeform, write_tagged,
    write_tagged_freeform, EncodeContext, MultilineLimits,
};

/// Tag naming the channel a private message is about.
pub const CHANNEL_CONTEXT_TAG: &str = "+draft/channel-context";

/// Client-only typing tag.
pub const TYPING_TAG: &str = "+typing";

/// Byte budget for the target list of one `MONITOR +`/`-` line.
const MONITOR_LIST_BUDGET: usize = 400;

/// `+typing` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypingState {
    Active,
    Paused,
    Done,
}

impl TypingState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Done => "done",
        }
    }
}

// ============================================================================
// Registration
// ============================================================================

pub fn pass(password: &str) -> String {
    write_cmd("PASS", &[password])
}

pub fn cap_ls() -> String {
    "CAP LS 302".to_owned()
}

pub fn cap_req(caps: &str) -> String {
    write_cmd_freeform("CAP", &["REQ", caps])
}

pub fn cap_end() -> String {
    "CAP END".to_owned()
}

pub fn user(username: &str, realname: &str) -> String {
    write_cmd_freeform("USER", &[username, "0", "*", realname])
}

pub fn nick(nickname: &str) -> String {
    write_cmd("NICK", &[nickname])
}

pub fn authenticate(payload: &str) -> String {
    write_cmd("AUTHENTICATE", &[payload])
}

pub fn quit(reason: Option<&str>) -> String {
    match reason {
        Some(reason) => write_cmd_freeform("QUIT", &[reason]),
        None => "QUIT".to_owned(),
    }
}

pub fn ping(token: &str) -> String {
    write_cmd_freeform("PING", &[token])
}

pub fn pong(token: &str) -> String {
    write_cmd_freeform("PONG", &[token])
}

// ============================================================================
// Channels
// ============================================================================

pub fn join(channel: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => write_cmd("JOIN", &[channel, key]),
        None => write_cmd("JOIN", &[channel]),
    }
}

pub fn part(channel: &str, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => write_cmd_freeform("PART", &[channel, reason]),
        None => write_cmd("PART", &[channel]),
    }
}

pub fn topic_get(channel: &str) -> String {
    write_cmd("TOPIC", &[channel])
}

/// Set the topic; an empty topic clears it.
pub fn topic_set(channel: &str, topic: &str) -> String {
    write_cmd_freeform("TOPIC", &[channel, topic])
}

pub fn invite(nickname: &str, channel: &str) -> String {
    write_cmd("INVITE", &[nickname, channel])
}

pub fn kick(channel: &str, nickname: &str, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => write_cmd_freeform("KICK", &[channel, nickname, reason]),
        None => write_cmd("KICK", &[channel, nickname]),
    }
}

pub fn mode(target: &str, modes: &str, args: &[&str]) -> String {
    let mut all = Vec::with_capacity(args.len() + 2);
    all.push(target);
    all.push(modes);
    all.extend_from_slice(args);
    write_cmd("MODE", &all)
}

/// Add or remove a mask on a ban, exception or invite-exception list.
pub fn list_mode_change(channel: &str, list: ListMode, adding: bool, mask: &str) -> String {
    let flag = format!("{}{}", if adding { '+' } else { '-' }, list.as_char());
    mode(channel, &flag, &[mask])
}

/// Request the contents of a moderation list.
pub fn list_mode_query(channel: &str, list: ListMode) -> String {
    write_cmd("MODE", &[channel, format!("+{}", list.as_char()).as_str()])
}

pub fn ban(channel: &str, mask: &str) -> String {
    list_mode_change(channel, ListMode::Ban, true, mask)
}

pub fn unban(channel: &str, mask: &str) -> String {
    list_mode_change(channel, ListMode::Ban, false, mask)
}

pub fn exception_add(channel: &str, mask: &str) -> String {
    list_mode_change(channel, ListMode::Exception, true, mask)
}

pub fn exception_remove(channel: &str, mask: &str) -> String {
    list_mode_change(channel, ListMode::Exception, false, mask)
}

pub fn invex_add(channel: &str, mask: &str) -> String {
    list_mode_change(channel, ListMode::InviteException, true, mask)
}

pub fn invex_remove(channel: &str, mask: &str) -> String {
    list_mode_change(channel, ListMode::InviteException, false, mask)
}

/// `LIST`, optionally with ELIST filters.
pub fn list(filters: &[&str]) -> String {
    if filters.is_empty() {
        "LIST".to_owned()
    } else {
        write_cmd("LIST", &[filters.join(",").as_str()])
    }
}

pub fn rename(old: &str, new: &str, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => write_cmd_freeform("RENAME", &[old, new, reason]),
        None => write_cmd("RENAME", &[old, new]),
    }
}

// ============================================================================
// Users
// ============================================================================

pub fn whois(nickname: &str) -> String {
    write_cmd("WHOIS", &[nickname])
}

pub fn who(mask: &str) -> String {
    write_cmd("WHO", &[mask])
}

/// Set or clear (`None`) our away status.
pub fn away(message: Option<&str>) -> String {
    match message {
        Some(message) if !message.is_empty() => write_cmd_freeform("AWAY", &[message]),
        _ => "AWAY".to_owned(),
    }
}

/// `REGISTER <account> <email|*> <password>`.
pub fn register(account: &str, email: Option<&str>, password: &str) -> String {
    write_cmd("REGISTER", &[account, email.unwrap_or("*"), password])
}

pub fn verify(account: &str, code: &str) -> String {
    write_cmd("VERIFY", &[account, code])
}

fn monitor_lists(op: &str, targets: &[&str]) -> Vec<String> {
    crate::caps::request_batches(targets, MONITOR_LIST_BUDGET)
        .into_iter()
        .map(|batch| write_cmd("MONITOR", &[op, batch.replace(' ', ",").as_str()]))
        .collect()
}

pub fn monitor_add(targets: &[&str]) -> Vec<String> {
    monitor_lists("+", targets)
}

pub fn monitor_remove(targets: &[&str]) -> Vec<String> {
    monitor_lists("-", targets)
}

pub fn monitor_clear() -> String {
    "MONITOR C".to_owned()
}

pub fn monitor_list() -> String {
    "MONITOR L".to_owned()
}

// ============================================================================
// Metadata
// ============================================================================

pub fn metadata_get(target: &str, keys: &[&str]) -> String {
    let mut args = vec![target, "GET"];
    args.extend_from_slice(keys);
    write_cmd("METADATA", &args)
}

pub fn metadata_list(target: &str) -> String {
    write_cmd("METADATA", &[target, "LIST"])
}

/// Set a key, or unset it when `value` is `None`.
pub fn metadata_set(target: &str, key: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => write_cmd_freeform("METADATA", &[target, "SET", key, value]),
        None => write_cmd("METADATA", &[target, "SET", key]),
    }
}

pub fn metadata_clear(target: &str) -> String {
    write_cmd("METADATA", &[target, "CLEAR"])
}

pub fn metadata_sub(keys: &[&str]) -> String {
    let mut args = vec!["*", "SUB"];
    args.extend_from_slice(keys);
    write_cmd("METADATA", &args)
}

pub fn metadata_unsub(keys: &[&str]) -> String {
    let mut args = vec!["*", "UNSUB"];
    args.extend_from_slice(keys);
    write_cmd("METADATA", &args)
}

// ============================================================================
// Messages
// ============================================================================

pub fn privmsg(ctx: &EncodeContext, target: &str, text: &str) -> Vec<String> {
    message_lines(ctx, "PRIVMSG", target, &[], text)
}

pub fn notice(ctx: &EncodeContext, target: &str, text: &str) -> Vec<String> {
    message_lines(ctx, "NOTICE", target, &[], text)
}

/// Private message to `target` shown in the context of `channel`. Without
/// `message-tags` the context tag is left off and a plain PRIVMSG goes out.
pub fn whisper(ctx: &EncodeContext, target: &str, channel: &str, text: &str) -> Vec<String> {
    if !ctx.message_tags {
        return message_lines(ctx, "PRIVMSG", target, &[], text);
    }
    message_lines(
        ctx,
        "PRIVMSG",
        target,
        &[(CHANNEL_CONTEXT_TAG, Some(channel))],
        text,
    )
}

/// Typing notification. `None` without `message-tags`, since the server
/// would strip the tag.
pub fn typing(ctx: &EncodeContext, target: &str, state: TypingState) -> Option<String> {
    ctx.message_tags
        .then(|| write_tagged(&[(TYPING_TAG, Some(state.as_str()))], "TAGMSG", &[target]))
}

pub fn redact(target: &str, msgid: &str, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => write_cmd_freeform("REDACT", &[target, msgid, reason]),
        None => write_cmd("REDACT", &[target, msgid]),
    }
}

/// A caller-supplied line, with line breaks removed.
pub fn raw(line: &str) -> String {
    sanitize_raw(line)
}

/// One piece of an outbound message: a fragment of a logical line and
/// whether it continues the previous piece without a line break.
struct Piece<'a> {
    text: &'a str,
    concat: bool,
}

fn message_lines(
    ctx: &EncodeContext,
    cmd: &str,
    target: &str,
    tags: &[(&str, Option<&str>)],
    text: &str,
) -> Vec<String> {
    let budget = payload_budget(cmd, target);
    let logical: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    match ctx.multiline {
        Some(limits) => {
            let mut pieces = Vec::new();
            for line in &logical {
                if line.is_empty() {
                    pieces.push(Piece { text: "", concat: false });
                    continue;
                }
                for (i, fragment) in split_message(line, budget).enumerate() {
                    pieces.push(Piece {
                        text: fragment,
                        concat: i > 0,
                    });
                }
            }
            while pieces.last().is_some_and(|p| p.text.is_empty()) {
                pieces.pop();
            }
            if pieces.len() > 1 {
                return batched_lines(limits, cmd, target, tags, &pieces);
            }
            pieces
                .iter()
                .map(|p| write_tagged_freeform(tags, cmd, &[target, p.text]))
                .collect()
        }
        None => logical
            .iter()
            .filter(|line| !line.is_empty())
            .flat_map(|line| split_message(line, budget))
            .map(|chunk| write_tagged_freeform(tags, cmd, &[target, chunk]))
            .collect(),
    }
}

fn batched_lines(
    limits: MultilineLimits,
    cmd: &str,
    target: &str,
    tags: &[(&str, Option<&str>)],
    pieces: &[Piece<'_>],
) -> Vec<String> {
    let max_lines = limits.max_lines.unwrap_or(usize::MAX).max(1);
    let max_bytes = limits.max_bytes.unwrap_or(usize::MAX);

    // Group pieces into batches that respect the advertised limits.
    let mut groups: Vec<&[Piece<'_>]> = Vec::new();
    let (mut start, mut bytes) = (0, 0);
    for (i, piece) in pieces.iter().enumerate() {
        let separator = usize::from(i > start && !piece.concat);
        let added = piece.text.len() + separator;
        if i > start && (i - start >= max_lines || bytes + added > max_bytes) {
            groups.push(&pieces[start..i]);
            start = i;
            bytes = piece.text.len();
        } else {
            bytes += added;
        }
    }
    groups.push(&pieces[start..]);

    let mut lines = Vec::with_capacity(pieces.len() + groups.len() * 2);
    for group in groups {
        let reference = generate_batch_ref();
        let open = format!("+{}", reference);
        lines.push(write_tagged(
            tags,
            "BATCH",
            &[open.as_str(), "draft/multiline", target],
        ));
        for (i, piece) in group.iter().enumerate() {
            let mut member_tags = vec![("batch", Some(reference.as_str()))];
            // The first member of a batch never carries the concat tag.
            if piece.concat && i > 0 {
                member_tags.push((MULTILINE_CONCAT_TAG, None));
            }
            lines.push(write_tagged_freeform(&member_tags, cmd, &[target, piece.text]));
        }
        lines.push(format!("BATCH -{}", reference));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multiline_ctx(max_lines: Option<usize>) -> EncodeContext {
        EncodeContext {
            multiline: Some(MultilineLimits {
                max_bytes: Some(4096),
                max_lines,
            }),
            message_tags: true,
        }
    }

    fn batch_ref(open: &str) -> &str {
        open.split(' ')
            .nth(1)
            .and_then(|r| r.strip_prefix('+'))
            .unwrap()
    }

    // ========================================================================
    // Simple commands
    // ========================================================================

    #[test]
    fn test_channel_commands() {
        assert_eq!(join("#rust", None), "JOIN #rust");
        assert_eq!(join("#rust", Some("key")), "JOIN #rust key");
        assert_eq!(part("#rust", Some("bye")), "PART #rust :bye");
        assert_eq!(topic_get("#rust"), "TOPIC #rust");
        assert_eq!(topic_set("#rust", ""), "TOPIC #rust :");
        assert_eq!(kick("#rust", "spam", Some("flood")), "KICK #rust spam :flood");
        assert_eq!(invite("alice", "#rust"), "INVITE alice #rust");
        assert_eq!(rename("#old", "#new", None), "RENAME #old #new");
    }

    #[test]
    fn test_list_modes() {
        assert_eq!(ban("#r", "*!*@spam"), "MODE #r +b *!*@spam");
        assert_eq!(unban("#r", "*!*@spam"), "MODE #r -b *!*@spam");
        assert_eq!(exception_add("#r", "a!*@*"), "MODE #r +e a!*@*");
        assert_eq!(invex_remove("#r", "b!*@*"), "MODE #r -I b!*@*");
        assert_eq!(list_mode_query("#r", ListMode::Ban), "MODE #r +b");
    }

    #[test]
    fn test_account_and_presence() {
        assert_eq!(register("me", None, "hunter2"), "REGISTER me * hunter2");
        assert_eq!(
            register("me", Some("me@example.org"), "two words"),
            "REGISTER me me@example.org :two words"
        );
        assert_eq!(verify("me", "123456"), "VERIFY me 123456");
        assert_eq!(away(Some("lunch")), "AWAY :lunch");
        assert_eq!(away(None), "AWAY");
        assert_eq!(quit(None), "QUIT");
        assert_eq!(user("guest", "Real Name"), "USER guest 0 * :Real Name");
        assert_eq!(cap_req("batch server-time"), "CAP REQ :batch server-time");
    }

    #[test]
    fn test_metadata() {
        assert_eq!(metadata_get("alice", &["avatar", "url"]), "METADATA alice GET avatar url");
        assert_eq!(metadata_list("*"), "METADATA * LIST");
        assert_eq!(
            metadata_set("*", "display-name", Some("Ann")),
            "METADATA * SET display-name :Ann"
        );
        assert_eq!(metadata_set("*", "avatar", None), "METADATA * SET avatar");
        assert_eq!(metadata_clear("#rust"), "METADATA #rust CLEAR");
        assert_eq!(metadata_sub(&["avatar"]), "METADATA * SUB avatar");
        assert_eq!(metadata_unsub(&["avatar"]), "METADATA * UNSUB avatar");
    }

    #[test]
    fn test_monitor_lists_are_comma_joined() {
        assert_eq!(monitor_add(&["a", "b"]), vec!["MONITOR + a,b"]);
        let many: Vec<String> = (0..200).map(|i| format!("nick{:03}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let lines = monitor_remove(&refs);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.starts_with("MONITOR - ")));
        assert_eq!(monitor_clear(), "MONITOR C");
        assert_eq!(monitor_list(), "MONITOR L");
    }

    #[test]
    fn test_list_and_redact() {
        assert_eq!(list(&[]), "LIST");
        assert_eq!(list(&[">10", "#rust*"]), "LIST >10,#rust*");
        assert_eq!(redact("#r", "abc123", None), "REDACT #r abc123");
        assert_eq!(redact("#r", "abc123", Some("oops")), "REDACT #r abc123 :oops");
    }

    #[test]
    fn test_typing_requires_message_tags() {
        assert_eq!(typing(&EncodeContext::default(), "#r", TypingState::Active), None);
        assert_eq!(
            typing(&multiline_ctx(None), "#r", TypingState::Paused).as_deref(),
            Some("@+typing=paused TAGMSG #r")
        );
    }

    // ========================================================================
    // Message splitting
    // ========================================================================

    #[test]
    fn test_long_message_splits_at_ceiling() {
        let text = "a".repeat(1000);
        let lines = privmsg(&EncodeContext::default(), "#chan", &text);
        let budget = payload_budget("PRIVMSG", "#chan");
        assert_eq!(lines.len(), 3);
        let payloads: Vec<&str> = lines
            .iter()
            .map(|l| l.strip_prefix("PRIVMSG #chan :").unwrap())
            .collect();
        assert_eq!(payloads[0].len(), budget);
        assert_eq!(payloads.concat(), text);
    }

    #[test]
    fn test_split_prefers_late_space() {
        let text = format!("{} {}", "a".repeat(300), "b".repeat(200));
        let lines = privmsg(&EncodeContext::default(), "#c", &text);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("PRIVMSG #c :{} ", "a".repeat(300)));
        assert_eq!(lines[1], format!("PRIVMSG #c :{}", "b".repeat(200)));
    }

    #[test]
    fn test_split_ignores_early_space() {
        let text = format!("{} {}", "a".repeat(100), "b".repeat(400));
        let lines = privmsg(&EncodeContext::default(), "#c", &text);
        let budget = payload_budget("PRIVMSG", "#c");
        assert_eq!(lines[0].len(), "PRIVMSG #c :".len() + budget);
    }

    // ========================================================================
    // Multiline
    // ========================================================================

    #[test]
    fn test_multiline_without_cap_sends_each_line() {
        let lines = privmsg(&EncodeContext::default(), "#c", "first\n\nsecond\r\n");
        assert_eq!(lines, vec!["PRIVMSG #c :first", "PRIVMSG #c :second"]);
    }

    #[test]
    fn test_multiline_batch_wrapping() {
        let lines = privmsg(&multiline_ctx(None), "#c", "hello\nworld");
        assert_eq!(lines.len(), 4);
        let reference = batch_ref(&lines[0]).to_owned();
        assert_eq!(lines[0], format!("BATCH +{} draft/multiline #c", reference));
        assert_eq!(lines[1], format!("@batch={} PRIVMSG #c :hello", reference));
        assert_eq!(lines[2], format!("@batch={} PRIVMSG #c :world", reference));
        assert_eq!(lines[3], format!("BATCH -{}", reference));
    }

    #[test]
    fn test_multiline_continuations_carry_concat() {
        let lines = privmsg(&multiline_ctx(None), "#c", &"x".repeat(1000));
        let reference = batch_ref(&lines[0]).to_owned();
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with(&format!("@batch={} PRIVMSG", reference)));
        let concat = format!("@batch={};draft/multiline-concat PRIVMSG", reference);
        assert!(lines[2].starts_with(&concat));
        assert!(lines[3].starts_with(&concat));
    }

    #[test]
    fn test_multiline_respects_max_lines() {
        let lines = privmsg(&multiline_ctx(Some(2)), "#c", "a\nb\nc");
        let opens = lines.iter().filter(|l| l.starts_with("BATCH +")).count();
        let closes = lines.iter().filter(|l| l.starts_with("BATCH -")).count();
        assert_eq!((opens, closes), (2, 2));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_single_short_line_is_not_batched() {
        let lines = privmsg(&multiline_ctx(None), "#c", "just one");
        assert_eq!(lines, vec!["PRIVMSG #c :just one"]);
    }

    #[test]
    fn test_whisper_tags() {
        let ctx = EncodeContext {
            multiline: None,
            message_tags: true,
        };
        let lines = whisper(&ctx, "bob", "#rust", "psst");
        assert_eq!(lines, vec!["@+draft/channel-context=#rust PRIVMSG bob :psst"]);

        let lines = whisper(&multiline_ctx(None), "bob", "#rust", "a\nb");
        assert!(lines[0].starts_with("@+draft/channel-context=#rust BATCH +"));
        assert!(lines[1].starts_with("@batch="));
    }

    #[test]
    fn test_whisper_without_message_tags_is_plain() {
        let lines = whisper(&EncodeContext::default(), "bob", "#rust", "psst");
        assert_eq!(lines, vec!["PRIVMSG bob :psst"]);
    }
}
