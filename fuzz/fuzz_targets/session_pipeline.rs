//! Fuzz target for the session pipeline: arbitrary server lines fed to one
//! registered session must never panic.

#![no_main]

use chrono::Utc;
use libfuzzer_sys::fuzz_target;
use slirc_client::negotiation::{NegotiationConfig, NEGOTIATION_TIMEOUT};
use slirc_client::session::SessionCore;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let mut core = SessionCore::new(
        "irc.fuzz",
        NegotiationConfig {
            nickname: "fuzz".into(),
            username: "fuzz".into(),
            realname: "Fuzz".into(),
            password: None,
            desired: vec!["batch".into(), "draft/multiline".into(), "sasl".into()],
            sasl: None,
            timeout: NEGOTIATION_TIMEOUT,
        },
    );
    core.begin();
    for line in input.split('\n') {
        let _ = core.handle_line(line.trim_end_matches('\r'), Utc::now());
    }
    let _ = core.negotiation_timeout();
    core.transport_closed();
});
