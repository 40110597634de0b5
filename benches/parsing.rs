//! Benchmarks for line parsing, the session pipeline and outbound encoding.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use slirc_client::encode::command as cmd;
use slirc_client::encode::{EncodeContext, MultilineLimits};
use slirc_client::negotiation::{NegotiationConfig, NEGOTIATION_TIMEOUT};
use slirc_client::session::SessionCore;
use slirc_client::Message;

const SIMPLE_MESSAGE: &str = "PING :irc.example.com";

const PREFIX_MESSAGE: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

const TAGGED_MESSAGE: &str = "@time=2023-01-01T00:00:00.000Z;msgid=abc123;+example/tag=value :nick!user@host PRIVMSG #channel :Hello with tags!";

const COMPLEX_TAGS: &str = "@time=2023-01-01T12:00:00Z;msgid=msg-12345;+draft/reply=parent-id;batch=batch001;account=username :nick!user@host.example.com PRIVMSG #long-channel-name :This is a longer message with more content to parse";

const NUMERIC_RESPONSE: &str = ":irc.server.net 001 nickname :Welcome to the IRC Network nickname!user@host";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Parsing");

    for (name, line) in [
        ("simple_ping", SIMPLE_MESSAGE),
        ("with_prefix", PREFIX_MESSAGE),
        ("with_tags", TAGGED_MESSAGE),
        ("complex_tags", COMPLEX_TAGS),
        ("numeric_response", NUMERIC_RESPONSE),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| {
                let msg = Message::parse(black_box(line), "irc.server.net").unwrap();
                black_box(msg)
            })
        });
    }

    group.finish();
}

fn registered_core() -> SessionCore {
    let mut core = SessionCore::new(
        "irc.server.net",
        NegotiationConfig {
            nickname: "nickname".into(),
            username: "bench".into(),
            realname: "Bench".into(),
            password: None,
            desired: Vec::new(),
            sasl: None,
            timeout: NEGOTIATION_TIMEOUT,
        },
    );
    core.begin();
    core.handle_line(":irc.server.net CAP * LS :", Utc::now());
    core.handle_line(NUMERIC_RESPONSE, Utc::now());
    core.handle_line(":nickname!u@h JOIN #channel", Utc::now());
    core
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Session Pipeline");

    group.bench_function("channel_message", |b| {
        let mut core = registered_core();
        b.iter(|| {
            let out = core.handle_line(black_box(TAGGED_MESSAGE), Utc::now());
            black_box(out)
        })
    });

    group.bench_function("multiline_batch", |b| {
        let mut core = registered_core();
        b.iter(|| {
            core.handle_line(":nick!u@h BATCH +b1 draft/multiline #channel", Utc::now());
            for i in 0..8 {
                core.handle_line(
                    &format!("@batch=b1 :nick!u@h PRIVMSG #channel :line number {}", i),
                    Utc::now(),
                );
            }
            let out = core.handle_line(":nick!u@h BATCH -b1", Utc::now());
            black_box(out)
        })
    });

    group.finish();
}

fn benchmark_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("Outbound Encoding");
    let long_text = "lorem ipsum dolor sit amet ".repeat(80);

    group.bench_function("privmsg_split", |b| {
        let ctx = EncodeContext::default();
        b.iter(|| black_box(cmd::privmsg(&ctx, "#channel", black_box(&long_text))))
    });

    group.bench_function("privmsg_multiline", |b| {
        let ctx = EncodeContext {
            multiline: Some(MultilineLimits {
                max_bytes: Some(4096),
                max_lines: Some(24),
            }),
            message_tags: true,
        };
        b.iter(|| black_box(cmd::privmsg(&ctx, "#channel", black_box(&long_text))))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parsing,
    benchmark_pipeline,
    benchmark_encoding,
);

criterion_main!(benches);
