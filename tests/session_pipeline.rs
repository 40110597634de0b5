//! End-to-end flows through the sans-IO session pipeline.
//!
//! These drive a [`SessionCore`] with raw server lines, the same way the
//! tokio actor does, and check the lines it answers with together with the
//! state it keeps.

use chrono::Utc;

use slirc_client::encode::command as cmd;
use slirc_client::encode::MultilineLimits;
use slirc_client::event::{Event, EventKind};
use slirc_client::negotiation::{NegotiationConfig, Phase, NEGOTIATION_TIMEOUT};
use slirc_client::session::{Output, SessionCore, TimerRequest};
use slirc_client::SaslCredentials;

fn core(sasl: Option<SaslCredentials>) -> SessionCore {
    SessionCore::new(
        "irc.test",
        NegotiationConfig {
            nickname: "me".into(),
            username: "me".into(),
            realname: "Me".into(),
            password: None,
            desired: ["sasl", "batch", "draft/multiline", "message-tags", "server-time"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sasl,
            timeout: NEGOTIATION_TIMEOUT,
        },
    )
}

fn feed(core: &mut SessionCore, line: &str) -> Output {
    core.handle_line(line, Utc::now())
}

fn kinds(out: &Output) -> Vec<EventKind> {
    out.events.iter().map(Event::kind).collect()
}

const OFFER: &str = ":irc.test CAP * LS :sasl=PLAIN batch draft/multiline=max-bytes=4096,max-lines=10 message-tags server-time";
const ACK: &str = ":irc.test CAP me ACK :sasl batch draft/multiline message-tags server-time";

/// Negotiate the full capability set without SASL and register.
fn negotiated() -> SessionCore {
    let mut core = core(None);
    core.begin();
    feed(&mut core, OFFER);
    feed(&mut core, ":irc.test CAP me ACK :batch draft/multiline message-tags server-time");
    feed(&mut core, ":irc.test 001 me :Welcome");
    core
}

/// Put a relay source in front of a line we would send, after any tags.
fn relayed(line: &str, source: &str) -> String {
    if line.starts_with('@') {
        let (tags, rest) = line.split_once(' ').unwrap();
        format!("{} :{} {}", tags, source, rest)
    } else {
        format!(":{} {}", source, line)
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================

#[test]
fn test_sasl_plain_registration() {
    let mut core = core(Some(SaslCredentials::plain("me", "secret")));

    let out = core.begin();
    assert_eq!(out.lines, vec!["CAP LS 302", "NICK me", "USER me 0 * :Me"]);

    let out = feed(&mut core, OFFER);
    assert_eq!(
        out.lines,
        vec!["CAP REQ :sasl batch draft/multiline message-tags server-time"]
    );
    assert_eq!(core.negotiator().phase(), Phase::Requesting);

    let out = feed(&mut core, ACK);
    assert_eq!(kinds(&out), vec![EventKind::CapAcknowledged]);
    assert_eq!(out.lines, vec!["AUTHENTICATE PLAIN"]);
    assert_eq!(out.timers, vec![TimerRequest::Arm(NEGOTIATION_TIMEOUT)]);

    let out = feed(&mut core, "AUTHENTICATE +");
    assert_eq!(out.lines, vec!["AUTHENTICATE AG1lAHNlY3JldA=="]);

    let out = feed(&mut core, ":irc.test 900 me me!me@host me :You are now logged in as me");
    assert_eq!(kinds(&out), vec![EventKind::AccountChange]);
    assert_eq!(core.state().current_user.account.as_deref(), Some("me"));

    let out = feed(&mut core, ":irc.test 903 me :SASL authentication successful");
    assert_eq!(kinds(&out), vec![EventKind::Authentication]);
    assert_eq!(out.lines, vec!["CAP END"]);
    assert!(out.negotiation_finished);
    assert!(out.timers.contains(&TimerRequest::Cancel));

    let out = feed(&mut core, ":irc.test 001 me :Welcome to the test network");
    assert!(out.registered);
    assert_eq!(kinds(&out), vec![EventKind::Registered]);

    let ctx = core.encode_context();
    assert!(ctx.message_tags);
    assert_eq!(
        ctx.multiline,
        Some(MultilineLimits {
            max_bytes: Some(4096),
            max_lines: Some(10),
        })
    );
}

#[test]
fn test_unanswered_sasl_is_ended_by_the_deadline() {
    let mut core = core(Some(SaslCredentials::plain("me", "secret")));
    core.begin();
    feed(&mut core, OFFER);
    let out = feed(&mut core, ACK);
    assert_eq!(out.lines, vec!["AUTHENTICATE PLAIN"]);

    let out = core.negotiation_timeout();
    assert_eq!(out.lines, vec!["CAP END"]);
    assert!(out.negotiation_finished);
    assert!(core.negotiator().is_finished());

    // A late result is still reported but no longer ends anything.
    let out = feed(&mut core, ":irc.test 904 me :SASL authentication failed");
    assert_eq!(kinds(&out), vec![EventKind::Authentication]);
    assert!(out.lines.is_empty());
}

#[test]
fn test_nick_collision_before_welcome() {
    let mut core = core(None);
    core.begin();
    feed(&mut core, ":irc.test CAP * LS :");

    let out = feed(&mut core, ":irc.test 433 * me :Nickname is already in use");
    assert_eq!(out.lines, vec!["NICK me_"]);
    match &out.events[..] {
        [Event::NicknameRejected(rejected)] => {
            assert_eq!(rejected.nick, "me");
            assert_eq!(rejected.retry.as_deref(), Some("me_"));
        }
        other => panic!("unexpected {:?}", other),
    }

    let out = feed(&mut core, ":irc.test 433 * me_ :Nickname is already in use");
    assert!(out.lines.is_empty());

    feed(&mut core, ":irc.test 001 me_ :Welcome");
    assert_eq!(core.state().nickname, "me_");
    assert!(core.state().is_self("ME_"));
}

// =============================================================================
// CHANNEL LIFE
// =============================================================================

#[test]
fn test_channel_join_names_topic_part() {
    let mut core = negotiated();
    feed(&mut core, ":irc.test 005 me PREFIX=(ov)@+ CHANTYPES=# :are supported");

    let out = feed(&mut core, ":me!me@host JOIN #rust");
    assert_eq!(kinds(&out), vec![EventKind::Join]);
    feed(&mut core, ":irc.test 332 me #rust :Systems programming");
    feed(&mut core, ":irc.test 333 me #rust ferris 1700000000");
    feed(&mut core, ":irc.test 353 me = #rust :@ferris +bob me");
    let out = feed(&mut core, ":irc.test 366 me #rust :End of /NAMES list");
    assert_eq!(kinds(&out), vec![EventKind::Names]);

    let chan = core.state().channel("#RUST").unwrap();
    let topic = chan.topic.as_ref().unwrap();
    assert_eq!(topic.text, "Systems programming");
    assert_eq!(topic.set_by.as_deref(), Some("ferris"));
    assert_eq!(chan.members.len(), 3);
    assert_eq!(chan.member("ferris").unwrap().highest(), Some('@'));

    let out = feed(&mut core, ":bob!b@host PART #rust :later");
    assert_eq!(kinds(&out), vec![EventKind::Part]);
    assert!(!core.state().channel("#rust").unwrap().has_member("bob"));

    let out = feed(&mut core, ":me!me@host PART #rust");
    assert_eq!(kinds(&out), vec![EventKind::Part]);
    assert!(core.state().channel("#rust").is_none());
}

#[test]
fn test_reconnect_keeps_channels_and_resets_connection_state() {
    let mut core = negotiated();
    feed(&mut core, ":me!me@host JOIN #rust");
    feed(&mut core, ":irc.test 353 me = #rust :me bob");
    feed(&mut core, ":irc.test 366 me #rust :End of /NAMES list");
    feed(&mut core, ":bob!b@host BATCH +open draft/multiline #rust");

    core.transport_closed();
    assert!(!core.state().registered);
    assert_eq!(core.open_batches(), 0);

    let out = core.begin();
    assert_eq!(out.lines[0], "CAP LS 302");
    assert!(core.state().caps.acknowledged.is_empty());
    assert!(core.state().channel("#rust").unwrap().members.is_empty());

    feed(&mut core, ":irc.test CAP * LS :");
    let out = feed(&mut core, ":irc.test 001 me :Welcome back");
    assert_eq!(out.lines, vec!["JOIN #rust"]);
}

// =============================================================================
// MULTILINE
// =============================================================================

#[test]
fn test_outbound_multiline_reassembles() {
    let mut core = negotiated();
    feed(&mut core, ":me!me@host JOIN #rust");

    let text = "first line\nsecond line mentions me";
    let lines = cmd::privmsg(&core.encode_context(), "#rust", text);
    assert!(lines[0].starts_with("BATCH +"));
    assert_eq!(lines.len(), 4);

    let mut events = Vec::new();
    for line in &lines {
        events.extend(feed(&mut core, &relayed(line, "bob!b@host")).events);
    }
    match &events[..] {
        [Event::MultilineMessage(message)] => {
            assert_eq!(message.body, text);
            assert_eq!(message.source.name, "bob");
            assert_eq!(message.target, "#rust");
            assert!(!message.notice);
        }
        other => panic!("unexpected {:?}", other),
    }

    let chan = core.state().channel("#rust").unwrap();
    assert_eq!((chan.unread, chan.mentions), (1, 1));
}

#[test]
fn test_multiline_server_time_from_batch_opener() {
    let mut core = negotiated();
    feed(&mut core, ":me!me@host JOIN #rust");

    feed(
        &mut core,
        "@time=2024-01-01T00:00:00.000Z :bob!b@host BATCH +t1 draft/multiline #rust",
    );
    feed(
        &mut core,
        "@batch=t1;time=2024-01-01T00:00:05.000Z;msgid=a :bob!b@host PRIVMSG #rust :one",
    );
    feed(&mut core, "@batch=t1;msgid=b :bob!b@host PRIVMSG #rust :two");
    let out = feed(&mut core, ":bob!b@host BATCH -t1");

    match &out.events[..] {
        [Event::MultilineMessage(message)] => {
            assert_eq!(message.time.timestamp(), 1_704_067_200);
            assert_eq!(message.message_ids, vec!["a", "b"]);
            assert_eq!(message.body, "one\ntwo");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_history_replay_is_not_a_live_message() {
    let mut core = negotiated();
    feed(&mut core, ":me!me@host JOIN #rust");

    let mut events = Vec::new();
    for line in [
        ":irc.test BATCH +h chathistory #rust",
        "@batch=h :bob!b@host BATCH +m draft/multiline #rust",
        "@batch=m :bob!b@host PRIVMSG #rust :old one",
        "@batch=m :bob!b@host PRIVMSG #rust :old two",
        ":irc.test BATCH -m",
        ":irc.test BATCH -h",
    ] {
        events.extend(feed(&mut core, line).events);
    }

    assert!(events.is_empty(), "unexpected {:?}", events);
    assert_eq!(core.state().channel("#rust").unwrap().unread, 0);
    assert_eq!(core.open_batches(), 0);
}
