//! Property-based tests for line parsing, framing and payload splitting.

use std::collections::BTreeSet;

use bytes::BytesMut;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

use slirc_client::message::tags::{escape_tag_value, unescape_tag_value};
use slirc_client::negotiation::{NegotiationConfig, Negotiator, NEGOTIATION_TIMEOUT};
use slirc_client::Capabilities;
use slirc_client::util::{split_message, truncate_utf8_safe};
use slirc_client::{irc_eq, irc_to_lower, LineCodec, Message};

// =============================================================================
// STRATEGIES
// =============================================================================

fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z\\[\\]\\\\^_`{|}][a-zA-Z0-9\\-\\[\\]\\\\^_`{|}]{0,8}")
        .expect("valid regex")
}

fn command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-zA-Z]{1,10}").expect("valid regex"),
        prop::string::string_regex("[0-9]{3}").expect("valid regex"),
    ]
}

fn middle_param_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9#&*=+_.-][a-zA-Z0-9#&*=+_.:-]{0,15}").expect("valid regex")
}

fn trailing_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,200}").expect("valid regex")
}

/// Capability tokens a server might list, some with values.
const CAP_POOL: &[&str] = &[
    "batch",
    "server-time",
    "message-tags",
    "multi-prefix",
    "away-notify",
    "account-tag",
    "extended-join",
    "echo-message",
    "draft/multiline=max-bytes=4096,max-lines=24",
    "draft/metadata-2=max-subs=50",
    "userhost-in-names",
    "vendor.example/thing",
];

fn cap_name(token: &str) -> &str {
    token.split_once('=').map_or(token, |(name, _)| name)
}

fn text_line_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,60}").expect("valid regex")
}

// =============================================================================
// PARSING
// =============================================================================

proptest! {
    #[test]
    fn test_parse_never_panics(line in "[^\r\n\0]{0,600}") {
        let _ = Message::parse(&line, "irc.test");
    }

    #[test]
    fn test_parse_structured_line(
        nick in nickname_strategy(),
        command in command_strategy(),
        middle in prop::collection::vec(middle_param_strategy(), 0..6),
        trailing in trailing_strategy(),
    ) {
        let mut line = format!(":{}!user@host {}", nick, command);
        for param in &middle {
            line.push(' ');
            line.push_str(param);
        }
        line.push_str(" :");
        line.push_str(&trailing);

        let msg = Message::parse(&line, "irc.test").expect("well-formed line");
        prop_assert_eq!(&msg.command, &command.to_ascii_uppercase());
        prop_assert_eq!(&msg.source.name, &nick);
        prop_assert_eq!(msg.params.len(), middle.len() + 1);
        prop_assert_eq!(&msg.params[..middle.len()], &middle[..]);
        prop_assert_eq!(msg.trailing(), Some(trailing.as_str()));
    }

    #[test]
    fn test_tag_value_escaping_is_reversible(value in "[^\0]{0,100}") {
        let mut escaped = String::new();
        escape_tag_value(&mut escaped, &value).unwrap();
        prop_assert!(!escaped.contains([' ', ';', '\r', '\n']));
        prop_assert_eq!(unescape_tag_value(&escaped), value);
    }
}

// =============================================================================
// FRAMING
// =============================================================================

proptest! {
    #[test]
    fn test_line_codec_ignores_chunk_boundaries(
        lines in prop::collection::vec(text_line_strategy(), 0..12),
        chunk in 1usize..32,
    ) {
        let mut wire = Vec::new();
        for line in &lines {
            wire.extend_from_slice(line.as_bytes());
            wire.extend_from_slice(b"\r\n");
        }

        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(line) = codec.decode(&mut buf).unwrap() {
                decoded.push(line);
            }
        }

        let expected: Vec<&String> = lines.iter().filter(|l| !l.trim().is_empty()).collect();
        prop_assert_eq!(decoded.iter().collect::<Vec<_>>(), expected);
        prop_assert!(buf.is_empty());
    }
}

// =============================================================================
// PAYLOADS AND CASE MAPPING
// =============================================================================

proptest! {
    #[test]
    fn test_split_message_covers_input(text in "\\PC{0,600}", max in 4usize..200) {
        let chunks: Vec<&str> = split_message(&text, max).collect();
        prop_assert_eq!(chunks.concat(), text.clone());
        for chunk in &chunks {
            prop_assert!(!chunk.is_empty());
            prop_assert!(chunk.len() <= max);
        }
    }

    #[test]
    fn test_truncate_is_a_char_boundary_prefix(text in "\\PC{0,100}", max in 0usize..120) {
        let cut = truncate_utf8_safe(&text, max);
        prop_assert!(cut.len() <= max);
        prop_assert!(text.starts_with(cut));
        prop_assert!(cut.len() + 4 > max || cut.len() == text.len());
    }

    #[test]
    fn test_case_mapping(name in nickname_strategy()) {
        let lower = irc_to_lower(&name);
        prop_assert!(irc_eq(&name, &lower));
        prop_assert_eq!(irc_to_lower(&lower), lower.clone());
        prop_assert!(irc_eq(&name.to_ascii_uppercase(), &lower));
    }
}

// =============================================================================
// CAPABILITY NEGOTIATION
// =============================================================================

proptest! {
    #[test]
    fn test_cap_ls_chunking_does_not_change_requests(
        offered in Just(CAP_POOL.to_vec()).prop_shuffle(),
        offered_len in 0usize..=CAP_POOL.len(),
        desired in prop::sample::subsequence(CAP_POOL.to_vec(), 0..=CAP_POOL.len()),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let offered = &offered[..offered_len];
        let desired: Vec<String> = desired.iter().map(|t| cap_name(t).to_string()).collect();
        let mut negotiator = Negotiator::new(NegotiationConfig {
            nickname: "me".into(),
            username: "me".into(),
            realname: "Me".into(),
            password: None,
            desired: desired.clone(),
            sasl: None,
            timeout: NEGOTIATION_TIMEOUT,
        });
        let mut caps = Capabilities::default();
        let _ = negotiator.start(&mut caps);

        let mut bounds: Vec<usize> = cuts.iter().map(|i| i.index(offered.len() + 1)).collect();
        bounds.push(0);
        bounds.push(offered.len());
        bounds.sort_unstable();

        let chunks: Vec<String> = bounds.windows(2).map(|w| offered[w[0]..w[1]].join(" ")).collect();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let line = if i == last {
                format!(":irc.test CAP * LS :{}", chunk)
            } else {
                format!(":irc.test CAP * LS * :{}", chunk)
            };
            let msg = Message::parse(&line, "irc.test").unwrap();
            let _ = negotiator.feed(&mut caps, &msg);
        }

        let offered_names: BTreeSet<&str> = offered.iter().map(|t| cap_name(t)).collect();
        let expected: BTreeSet<String> = desired
            .iter()
            .filter(|name| offered_names.contains(name.as_str()))
            .cloned()
            .collect();
        prop_assert_eq!(&caps.requested, &expected);
        prop_assert_eq!(caps.offered.len(), offered.len());
    }
}
