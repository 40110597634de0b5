//! Sans-IO capability and SASL negotiation.
//!
//! The [`Negotiator`] consumes parsed messages and produces
//! [`NegotiationAction`]s. It never touches a socket or a clock: timeouts are
//! requested with [`NegotiationAction::ArmTimeout`] and reported back by the
//! caller through [`Negotiator::timeout`].
//!
//! ```text
//! ListPending --LS (final chunk)--> Requesting --ACK sasl--> Authenticating --903/90x--> Ended
//!      |                                |                                                ^
//!      +------- nothing to request -----+------- all ACK/NAK, no sasl -------------------+
//! ```
//!
//! Authentication starts on the ACK that enables `sasl`, even while other
//! `CAP REQ` batches are unanswered, and its outcome ends negotiation.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.1>

use std::time::Duration;

use tracing::{debug, warn};

use crate::caps::{request_batches, Capabilities, Capability, CAP_REQ_BUDGET};
use crate::encode::command as cmd;
use crate::event::{
    AuthenticationResult, CapAcknowledged, CapRejected, CapabilitiesChanged, Event,
};
use crate::message::Message;
use crate::sasl::{authenticate_lines, parse_mechanisms, SaslCredentials, SaslMechanism};

/// Safety deadline for every negotiation step.
pub const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Registration details the negotiator sends.
#[derive(Clone, Debug)]
pub struct NegotiationConfig {
    pub nickname: String,
    pub username: String,
    pub realname: String,
    pub password: Option<String>,
    /// Capabilities to request when offered.
    pub desired: Vec<String>,
    pub sasl: Option<SaslCredentials>,
    pub timeout: Duration,
}

/// Where negotiation stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// `CAP LS 302` sent, collecting the offer.
    #[default]
    ListPending,
    /// `CAP REQ` batches outstanding.
    Requesting,
    /// SASL exchange in progress. `CAP REQ` batches may still be outstanding.
    Authenticating,
    /// `CAP END` sent (or the server skipped negotiation).
    Ended,
}

/// Side effects requested by the negotiator.
#[derive(Clone, Debug, PartialEq)]
pub enum NegotiationAction {
    /// Write this line.
    Send(String),
    /// Publish this event.
    Emit(Event),
    /// (Re)start the safety deadline.
    ArmTimeout(Duration),
    /// Drop the safety deadline.
    CancelTimeout,
    /// Negotiation is over.
    Finished,
}

/// Capability/SASL state machine for one connection attempt.
#[derive(Clone, Debug)]
pub struct Negotiator {
    config: NegotiationConfig,
    phase: Phase,
    /// `CAP REQ` batches not yet answered.
    outstanding: usize,
    /// Mechanisms from 908, if the server sent them.
    server_mechanisms: Vec<SaslMechanism>,
}

impl Negotiator {
    #[must_use]
    pub fn new(config: NegotiationConfig) -> Self {
        Negotiator {
            config,
            phase: Phase::ListPending,
            outstanding: 0,
            server_mechanisms: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Ended
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Use a different nickname on the next `start`.
    pub fn set_nickname(&mut self, nickname: &str) {
        self.config.nickname = nickname.to_string();
    }

    /// Begin a fresh negotiation. Resets `caps`.
    #[must_use]
    pub fn start(&mut self, caps: &mut Capabilities) -> Vec<NegotiationAction> {
        caps.clear();
        self.phase = Phase::ListPending;
        self.outstanding = 0;
        self.server_mechanisms.clear();

        let mut actions = Vec::with_capacity(5);
        if let Some(password) = &self.config.password {
            actions.push(NegotiationAction::Send(cmd::pass(password)));
        }
        actions.push(NegotiationAction::Send(cmd::cap_ls()));
        actions.push(NegotiationAction::Send(cmd::nick(&self.config.nickname)));
        actions.push(NegotiationAction::Send(cmd::user(
            &self.config.username,
            &self.config.realname,
        )));
        actions.push(NegotiationAction::ArmTimeout(self.config.timeout));
        actions
    }

    /// Feed one message. Lines the negotiator does not care about yield nothing.
    #[must_use]
    pub fn feed(&mut self, caps: &mut Capabilities, msg: &Message) -> Vec<NegotiationAction> {
        match msg.command.as_str() {
            "CAP" => self.handle_cap(caps, msg),
            "AUTHENTICATE" => self.handle_authenticate(msg),
            "908" => {
                self.server_mechanisms = parse_mechanisms(msg.param(1).unwrap_or_default());
                Vec::new()
            }
            "903" => self.handle_sasl_result(msg, true),
            "902" | "904" | "905" | "906" | "907" => self.handle_sasl_result(msg, false),
            "001" if self.phase != Phase::Ended => {
                debug!("registered before negotiation ended");
                self.phase = Phase::Ended;
                vec![NegotiationAction::CancelTimeout, NegotiationAction::Finished]
            }
            _ => Vec::new(),
        }
    }

    /// The safety deadline fired.
    #[must_use]
    pub fn timeout(&mut self) -> Vec<NegotiationAction> {
        if self.phase == Phase::Ended {
            return Vec::new();
        }
        warn!(phase = ?self.phase, "capability negotiation timed out");
        self.finalize()
    }

    fn handle_cap(&mut self, caps: &mut Capabilities, msg: &Message) -> Vec<NegotiationAction> {
        let sub = msg.param(1).unwrap_or_default().to_ascii_uppercase();
        match sub.as_str() {
            "LS" => {
                let (more, list) = match msg.param(2) {
                    Some("*") => (true, msg.param(3).unwrap_or_default()),
                    other => (false, other.unwrap_or_default()),
                };
                caps.offer(list);
                if more || self.phase != Phase::ListPending {
                    return Vec::new();
                }
                self.request(caps)
            }
            "ACK" => {
                let changed = caps.acknowledge(msg.param(2).unwrap_or_default());
                let mut actions = Vec::new();
                if !changed.is_empty() {
                    actions.push(NegotiationAction::Emit(
                        CapAcknowledged { caps: changed }.into(),
                    ));
                }
                actions.extend(self.begin_sasl(caps));
                actions.extend(self.answered());
                actions
            }
            "NAK" => {
                let rejected: Vec<String> = msg
                    .param(2)
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                debug!(?rejected, "capabilities rejected");
                for cap in &rejected {
                    caps.requested.remove(cap);
                }
                let mut actions = vec![NegotiationAction::Emit(
                    CapRejected { caps: rejected }.into(),
                )];
                actions.extend(self.answered());
                actions
            }
            "NEW" => {
                let added = caps.offer(msg.param(2).unwrap_or_default());
                vec![NegotiationAction::Emit(
                    CapabilitiesChanged {
                        added,
                        removed: Vec::new(),
                    }
                    .into(),
                )]
            }
            "DEL" => {
                let removed = caps.withdraw(msg.param(2).unwrap_or_default());
                vec![NegotiationAction::Emit(
                    CapabilitiesChanged {
                        added: Vec::new(),
                        removed,
                    }
                    .into(),
                )]
            }
            _ => Vec::new(),
        }
    }

    fn sasl_usable(&self, caps: &Capabilities) -> bool {
        let Some(creds) = &self.config.sasl else {
            return false;
        };
        let advertised = parse_mechanisms(caps.value(Capability::Sasl).unwrap_or_default());
        creds.is_offered(&advertised)
    }

    fn request(&mut self, caps: &mut Capabilities) -> Vec<NegotiationAction> {
        let sasl_usable = self.sasl_usable(caps);
        let wanted: Vec<&str> = self
            .config
            .desired
            .iter()
            .map(String::as_str)
            .filter(|name| caps.offered.contains_key(*name))
            .filter(|name| *name != Capability::Sasl.as_ref() || sasl_usable)
            .collect();

        if wanted.is_empty() {
            return self.finalize();
        }

        let batches = request_batches(&wanted, CAP_REQ_BUDGET);
        caps.requested.extend(wanted.iter().map(|s| s.to_string()));
        self.outstanding = batches.len();
        self.phase = Phase::Requesting;
        debug!(batches = batches.len(), "requesting capabilities");

        let mut actions: Vec<NegotiationAction> = batches
            .iter()
            .map(|batch| NegotiationAction::Send(cmd::cap_req(batch)))
            .collect();
        actions.push(NegotiationAction::ArmTimeout(self.config.timeout));
        actions
    }

    /// Open the SASL exchange once `sasl` is acknowledged.
    fn begin_sasl(&mut self, caps: &Capabilities) -> Vec<NegotiationAction> {
        if self.phase != Phase::Requesting {
            return Vec::new();
        }
        let mechanism = match &self.config.sasl {
            Some(creds) if caps.is_enabled(Capability::Sasl) => creds.mechanism.to_string(),
            _ => return Vec::new(),
        };
        self.phase = Phase::Authenticating;
        debug!(%mechanism, outstanding = self.outstanding, "starting SASL");
        vec![
            NegotiationAction::Send(cmd::authenticate(&mechanism)),
            NegotiationAction::ArmTimeout(self.config.timeout),
        ]
    }

    /// One `CAP REQ` batch was answered.
    fn answered(&mut self) -> Vec<NegotiationAction> {
        if !matches!(self.phase, Phase::Requesting | Phase::Authenticating) {
            return Vec::new();
        }
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.outstanding > 0 || self.phase == Phase::Authenticating {
            return Vec::new();
        }
        self.finalize()
    }

    fn handle_authenticate(&mut self, msg: &Message) -> Vec<NegotiationAction> {
        if self.phase != Phase::Authenticating || msg.param(0) != Some("+") {
            return Vec::new();
        }
        let Some(creds) = &self.config.sasl else {
            return Vec::new();
        };
        authenticate_lines(&creds.initial_response())
            .into_iter()
            .map(NegotiationAction::Send)
            .collect()
    }

    fn handle_sasl_result(&mut self, msg: &Message, success: bool) -> Vec<NegotiationAction> {
        let result = AuthenticationResult {
            success,
            code: msg.command.clone(),
            message: msg.trailing().unwrap_or_default().to_string(),
        };
        if !success {
            warn!(code = %result.code, message = %result.message, "SASL authentication failed");
            if !self.server_mechanisms.is_empty() {
                debug!(mechanisms = ?self.server_mechanisms, "server SASL mechanisms");
            }
        }
        let mut actions = vec![NegotiationAction::Emit(result.into())];
        if matches!(self.phase, Phase::Requesting | Phase::Authenticating) {
            actions.extend(self.finalize());
        }
        actions
    }

    fn finalize(&mut self) -> Vec<NegotiationAction> {
        self.phase = Phase::Ended;
        self.outstanding = 0;
        vec![
            NegotiationAction::CancelTimeout,
            NegotiationAction::Send(cmd::cap_end()),
            NegotiationAction::Finished,
        ]
    }
}
