//! Outbound line encoding.
//!
//! [`command`] has one function per outbound operation. They are pure:
//! the only session input they read is the [`EncodeContext`] derived from
//! the acknowledged capabilities. Lines are returned without CRLF; the
//! codec appends it.

pub mod command;

use crate::caps::{Capabilities, Capability};
use crate::message::tags::escape_tag_value;
use crate::util::MAX_MESSAGE_BODY;

/// Bytes reserved for the `:nick!user@host ` prefix the server adds when relaying.
pub const RELAY_PREFIX_HEADROOM: usize = 100;

/// Limits advertised in the `draft/multiline` capability value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MultilineLimits {
    pub max_bytes: Option<usize>,
    pub max_lines: Option<usize>,
}

impl MultilineLimits {
    /// Parse `max-bytes=4096,max-lines=24`.
    pub fn parse(value: &str) -> Self {
        let mut limits = MultilineLimits::default();
        for pair in value.split(',') {
            match pair.split_once('=') {
                Some(("max-bytes", n)) => limits.max_bytes = n.parse().ok(),
                Some(("max-lines", n)) => limits.max_lines = n.parse().ok(),
                _ => {}
            }
        }
        limits
    }
}

/// Capability-dependent encoding switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeContext {
    /// `Some` when `draft/multiline` was acknowledged.
    pub multiline: Option<MultilineLimits>,
    /// `message-tags` was acknowledged, so client-only tags may be sent.
    pub message_tags: bool,
}

impl EncodeContext {
    pub fn from_caps(caps: &Capabilities) -> Self {
        let multiline = Capability::Multiline;
        EncodeContext {
            multiline: caps
                .is_enabled(&multiline)
                .then(|| MultilineLimits::parse(caps.value(&multiline).unwrap_or_default())),
            message_tags: caps.is_enabled(Capability::MessageTags),
        }
    }
}

/// Check if a string needs colon-prefixing as a trailing IRC argument.
#[inline]
pub(crate) fn needs_colon_prefix(s: &str) -> bool {
    s.is_empty() || s.contains(' ') || s.starts_with(':')
}

fn push_sanitized(line: &mut String, arg: &str) {
    if arg.contains(['\r', '\n', '\0']) {
        line.extend(arg.chars().map(|c| match c {
            '\r' | '\n' | '\0' => ' ',
            c => c,
        }));
    } else {
        line.push_str(arg);
    }
}

fn write_tags(line: &mut String, tags: &[(&str, Option<&str>)]) {
    if tags.is_empty() {
        return;
    }
    line.push('@');
    for (i, (key, value)) in tags.iter().enumerate() {
        if i > 0 {
            line.push(';');
        }
        line.push_str(key);
        if let Some(value) = value {
            line.push('=');
            let _ = escape_tag_value(line, value);
        }
    }
    line.push(' ');
}

fn write_args(line: &mut String, args: &[&str], freeform: bool) {
    let Some((trailing, middle)) = args.split_last() else {
        return;
    };
    for arg in middle {
        line.push(' ');
        push_sanitized(line, arg);
    }
    line.push(' ');
    if freeform || needs_colon_prefix(trailing) {
        line.push(':');
    }
    push_sanitized(line, trailing);
}

/// Write a command with arguments. The last argument gets a `:` prefix if needed.
pub(crate) fn write_cmd(cmd: &str, args: &[&str]) -> String {
    write_tagged(&[], cmd, args)
}

/// Write a command whose last argument is always colon-prefixed.
pub(crate) fn write_cmd_freeform(cmd: &str, args: &[&str]) -> String {
    let mut line = String::with_capacity(64);
    line.push_str(cmd);
    write_args(&mut line, args, true);
    line
}

/// Write a command with tags.
pub(crate) fn write_tagged(tags: &[(&str, Option<&str>)], cmd: &str, args: &[&str]) -> String {
    let mut line = String::with_capacity(64);
    write_tags(&mut line, tags);
    line.push_str(cmd);
    write_args(&mut line, args, false);
    line
}

/// Write a freeform command with tags.
pub(crate) fn write_tagged_freeform(
    tags: &[(&str, Option<&str>)],
    cmd: &str,
    args: &[&str],
) -> String {
    let mut line = String::with_capacity(64);
    write_tags(&mut line, tags);
    line.push_str(cmd);
    write_args(&mut line, args, true);
    line
}

/// Payload bytes available to `<cmd> <target> :<payload>` once relayed.
pub fn payload_budget(cmd: &str, target: &str) -> usize {
    let framing = cmd.len() + 1 + target.len() + 2;
    MAX_MESSAGE_BODY
        .saturating_sub(2 + RELAY_PREFIX_HEADROOM + framing)
        .max(1)
}

/// Strip CR, LF and NUL from a caller-supplied raw line.
pub fn sanitize_raw(raw: &str) -> String {
    let mut line = String::with_capacity(raw.len());
    push_sanitized(&mut line, raw.trim_end_matches(['\r', '\n']));
    line
}
