//! Fuzz target for IRC line parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::util::{MAX_MESSAGE_BODY, MAX_TAGS_LENGTH};
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        if input.is_empty() || input.len() > MAX_MESSAGE_BODY + MAX_TAGS_LENGTH {
            return;
        }

        // Should never panic, and what parses must re-encode.
        if let Ok(message) = slirc_client::Message::parse(input, "irc.fuzz") {
            let _ = message.to_string();
        }
    }
});
