//! Sans-IO session pipeline.
//!
//! [`SessionCore`] owns everything one session knows and turns inbound
//! lines into an [`Output`]: events to publish, lines to write and timer
//! changes to apply. The tokio actor in `client` drives it; tests drive it
//! directly.
//!
//! ```text
//! raw line -> Message::parse -> BatchReassembler -> Negotiator -> handler table
//!                                                                 |
//!                                        SessionState mutation <--+--> Events
//! ```

mod handlers;

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::casemap::mentions;
use crate::encode::EncodeContext;
use crate::event::{ErrorReply, Event};
use crate::ircv3::BatchReassembler;
use crate::ircv3::BatchStep;
use crate::message::Message;
use crate::negotiation::{NegotiationAction, NegotiationConfig, Negotiator};
use crate::state::SessionState;

/// Commands the negotiator consumes entirely.
const NEGOTIATION_COMMANDS: &[&str] = &[
    "CAP",
    "AUTHENTICATE",
    "902",
    "903",
    "904",
    "905",
    "906",
    "907",
    "908",
];

/// Change to the negotiation deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerRequest {
    Arm(Duration),
    Cancel,
}

/// Everything produced by one step of the pipeline.
#[derive(Clone, Debug, Default)]
pub struct Output {
    pub events: Vec<Event>,
    /// Lines to write, in order.
    pub lines: Vec<String>,
    pub timers: Vec<TimerRequest>,
    /// `001` was handled.
    pub registered: bool,
    /// A `PONG` arrived.
    pub pong: bool,
    /// Capability negotiation ended.
    pub negotiation_finished: bool,
}

impl Output {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.lines.is_empty()
            && self.timers.is_empty()
            && !self.registered
            && !self.pong
            && !self.negotiation_finished
    }

    pub(crate) fn emit(&mut self, event: impl Into<Event>) {
        self.events.push(event.into());
    }

    pub(crate) fn send(&mut self, line: String) {
        self.lines.push(line);
    }

    fn apply(&mut self, actions: Vec<NegotiationAction>) {
        for action in actions {
            match action {
                NegotiationAction::Send(line) => self.lines.push(line),
                NegotiationAction::Emit(event) => self.events.push(event),
                NegotiationAction::ArmTimeout(after) => self.timers.push(TimerRequest::Arm(after)),
                NegotiationAction::CancelTimeout => self.timers.push(TimerRequest::Cancel),
                NegotiationAction::Finished => self.negotiation_finished = true,
            }
        }
    }
}

/// Protocol state of one session, independent of any transport.
#[derive(Debug)]
pub struct SessionCore {
    state: SessionState,
    negotiator: Negotiator,
    batches: BatchReassembler,
    /// The automatic `_` retry for a rejected nick was already sent.
    nick_retry_sent: bool,
}

impl SessionCore {
    pub fn new(server_name: impl Into<String>, negotiation: NegotiationConfig) -> Self {
        SessionCore {
            state: SessionState::new(server_name, negotiation.nickname.clone()),
            negotiator: Negotiator::new(negotiation),
            batches: BatchReassembler::new(),
            nick_retry_sent: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    /// Open batches still waiting for their close line.
    pub fn open_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn encode_context(&self) -> EncodeContext {
        EncodeContext::from_caps(&self.state.caps)
    }

    /// A transport is up: reset per-connection state and start registration.
    pub fn begin(&mut self) -> Output {
        self.state.prepare_reconnect();
        self.batches.clear();
        self.nick_retry_sent = false;
        let nickname = self.negotiator.config().nickname.clone();
        self.state.set_nickname(&nickname);

        let mut out = Output::default();
        out.apply(self.negotiator.start(&mut self.state.caps));
        out
    }

    /// Process one raw inbound line.
    pub fn handle_line(&mut self, raw: &str, now: DateTime<Utc>) -> Output {
        match Message::parse(raw, &self.state.server_name) {
            Ok(msg) => self.handle_message(&msg, now),
            Err(err) => {
                warn!(error = %err, line = raw, "dropping malformed line");
                Output::default()
            }
        }
    }

    /// Process one parsed inbound message.
    pub fn handle_message(&mut self, msg: &Message, now: DateTime<Utc>) -> Output {
        let mut out = Output::default();

        match self.batches.process(msg, now) {
            BatchStep::Consumed => return out,
            BatchStep::Multiline(multiline) => {
                self.count_unread(&multiline.target, &multiline.source.name, &multiline.body);
                out.emit(multiline);
                return out;
            }
            BatchStep::Pass => {}
        }

        out.apply(self.negotiator.feed(&mut self.state.caps, msg));

        let command = msg.command.as_str();
        let negotiation = NEGOTIATION_COMMANDS.contains(&command);
        if let Some(handler) = handlers::table().get(command) {
            handler(self, msg, now, &mut out);
        } else if !negotiation && is_error_numeric(command) {
            out.emit(ErrorReply {
                code: msg.command.clone(),
                params: msg.params.clone(),
            });
        } else if !negotiation {
            debug!(command, "unhandled command");
        }
        out
    }

    /// The negotiation deadline fired.
    pub fn negotiation_timeout(&mut self) -> Output {
        let mut out = Output::default();
        out.apply(self.negotiator.timeout());
        out
    }

    /// The transport went away. Open batches are discarded.
    pub fn transport_closed(&mut self) {
        let dropped = self.batches.clear();
        if dropped > 0 {
            debug!(dropped, "discarding open batches");
        }
        self.state.registered = false;
    }

    /// Clear unread and mention counters of a channel.
    pub fn mark_read(&mut self, channel: &str) -> bool {
        match self.state.channel_mut(channel) {
            Some(chan) => {
                chan.mark_read();
                true
            }
            None => false,
        }
    }

    /// Bump unread/mention counters for a channel message from someone else.
    fn count_unread(&mut self, target: &str, sender: &str, text: &str) {
        if self.state.is_self(sender) || !self.state.is_channel(target) {
            return;
        }
        let mentioned = mentions(text, &self.state.nickname);
        if let Some(chan) = self.state.channel_mut(target) {
            chan.unread += 1;
            if mentioned {
                chan.mentions += 1;
            }
        }
    }
}

fn is_error_numeric(command: &str) -> bool {
    command
        .parse::<u16>()
        .is_ok_and(|n| (400..600).contains(&n))
}
