//! The per-session task.
//!
//! One [`SessionActor`] owns one session: its transport, its deadlines and
//! its [`SessionCore`]. Inbound lines are processed strictly in arrival
//! order. Every deadline is a local of the actor, so once the task returns
//! nothing can fire against the session again.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::dispatch::EventRegistry;
use crate::encode::command as cmd;
use crate::error::ClientError;
use crate::event::{ConnectionStateChanged, SessionId};
use crate::line::LineCodec;
use crate::session::{Output, SessionCore, TimerRequest};
use crate::state::{ConnectionState, SessionState};
use crate::transport::{BoxedStream, Connector};

use super::config::{ClientConfig, ServerConfig};
use super::timer::Deadline;

type Transport = Framed<BoxedStream, LineCodec>;

/// Requests from the manager to a session.
#[derive(Debug)]
pub(crate) enum Command {
    /// Write these lines, or queue them until registration.
    Send(Vec<String>),
    MarkRead(String),
    Disconnect(Option<String>),
}

/// Outcome of the first registration, shared by every `connect` caller.
pub(crate) type Ready = oneshot::Sender<Result<SessionId, ClientError>>;

/// Published copies of the session's state, readable by the manager.
#[derive(Debug, Default)]
pub(crate) struct SessionShared {
    pub state: RwLock<SessionState>,
    pub connection: RwLock<ConnectionState>,
}

enum Opened {
    Stream(BoxedStream),
    Failed(String),
    Stop,
}

enum Closed {
    /// The transport went away; reconnect if allowed.
    Lost(String),
    /// The actor is done.
    Stop,
}

pub(crate) struct SessionActor {
    id: SessionId,
    server: ServerConfig,
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<EventRegistry>,
    shared: Arc<SessionShared>,
    core: SessionCore,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Lines produced while unregistered, flushed after `001`.
    pending: VecDeque<String>,
    attempts: u32,
    ready: Option<Ready>,
    registration: Deadline,
}

impl SessionActor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: SessionId,
        server: ServerConfig,
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        registry: Arc<EventRegistry>,
        shared: Arc<SessionShared>,
        commands: mpsc::UnboundedReceiver<Command>,
        ready: Ready,
    ) -> Self {
        let core = SessionCore::new(
            server.server_name(),
            server.negotiation(config.negotiation_timeout),
        );
        *shared.state.write() = core.state().clone();
        SessionActor {
            id,
            server,
            config,
            connector,
            registry,
            shared,
            core,
            commands,
            pending: VecDeque::new(),
            attempts: 0,
            ready: Some(ready),
            registration: Deadline::default(),
        }
    }

    pub(crate) async fn run(mut self) {
        self.registration.arm(self.config.registration_timeout);
        loop {
            self.transition(ConnectionState::Connecting, None);
            let reason = match self.open().await {
                Opened::Stream(stream) => {
                    self.transition(ConnectionState::Connected, None);
                    match self.drive(stream).await {
                        Closed::Lost(reason) => reason,
                        Closed::Stop => return,
                    }
                }
                Opened::Failed(reason) => {
                    warn!(session = %self.id, address = %self.server.address(), %reason, "connect failed");
                    if let Some(ready) = self.ready.take() {
                        let _ = ready.send(Err(ClientError::Connect {
                            address: self.server.address(),
                            reason: reason.clone(),
                        }));
                        self.transition(ConnectionState::Disconnected, Some(reason));
                        return;
                    }
                    reason
                }
                Opened::Stop => return,
            };

            self.core.transport_closed();
            self.publish_snapshot();
            self.transition(ConnectionState::Disconnected, Some(reason.clone()));
            if let Some(ready) = self.ready.take() {
                let _ = ready.send(Err(ClientError::Registration {
                    address: self.server.address(),
                    reason,
                }));
                return;
            }
            if !self.backoff().await {
                return;
            }
        }
    }

    async fn open(&mut self) -> Opened {
        let connector = Arc::clone(&self.connector);
        let server = self.server.clone();
        let connect = async move { connector.connect(&server).await };
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(stream) => Opened::Stream(stream),
                        Err(e) => Opened::Failed(e.to_string()),
                    };
                }
                command = self.commands.recv() => {
                    if !self.idle_command(command) {
                        return Opened::Stop;
                    }
                }
                _ = self.registration.expired() => {
                    self.registration_timed_out();
                    return Opened::Stop;
                }
            }
        }
    }

    async fn drive(&mut self, stream: BoxedStream) -> Closed {
        let mut transport = Framed::new(stream, LineCodec::new());
        let mut negotiation = Deadline::default();
        let mut pong = Deadline::default();
        let period = self.config.ping_interval;
        let mut ping = interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let out = self.core.begin();
        if let Err(reason) = self
            .apply(out, &mut transport, &mut negotiation, &mut pong)
            .await
        {
            return Closed::Lost(reason);
        }

        loop {
            let step = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(lines)) if self.core.state().registered => {
                        write(&mut transport, lines).await
                    }
                    Some(Command::Send(lines)) => {
                        self.queue(lines);
                        Ok(())
                    }
                    Some(Command::MarkRead(channel)) => {
                        self.mark_read(&channel);
                        Ok(())
                    }
                    Some(Command::Disconnect(reason)) => {
                        self.quit(&mut transport, reason).await;
                        self.shutdown("disconnected");
                        return Closed::Stop;
                    }
                    None => {
                        self.quit(&mut transport, None).await;
                        self.shutdown("session dropped");
                        return Closed::Stop;
                    }
                },
                line = transport.next() => match line {
                    Some(Ok(line)) => {
                        let out = self.core.handle_line(&line, Utc::now());
                        self.apply(out, &mut transport, &mut negotiation, &mut pong).await
                    }
                    Some(Err(e)) => Err(e.to_string()),
                    None => Err("connection closed".to_string()),
                },
                _ = ping.tick() => {
                    if !pong.is_armed() {
                        pong.arm(self.config.pong_timeout);
                    }
                    let token = Utc::now().timestamp_millis().to_string();
                    write(&mut transport, vec![cmd::ping(&token)]).await
                }
                _ = pong.expired() => {
                    warn!(session = %self.id, "ping timeout");
                    Err("ping timeout".to_string())
                }
                _ = negotiation.expired() => {
                    let out = self.core.negotiation_timeout();
                    self.apply(out, &mut transport, &mut negotiation, &mut pong).await
                }
                _ = self.registration.expired() => {
                    let _ = transport.close().await;
                    self.registration_timed_out();
                    return Closed::Stop;
                }
            };
            if let Err(reason) = step {
                return Closed::Lost(reason);
            }
        }
    }

    /// Carry out one pipeline step. `Err` means the transport failed.
    async fn apply(
        &mut self,
        out: Output,
        transport: &mut Transport,
        negotiation: &mut Deadline,
        pong: &mut Deadline,
    ) -> Result<(), String> {
        for timer in &out.timers {
            match timer {
                TimerRequest::Arm(after) => negotiation.arm(*after),
                TimerRequest::Cancel => negotiation.cancel(),
            }
        }
        if out.pong {
            pong.cancel();
        }
        if out.negotiation_finished {
            debug!(
                session = %self.id,
                caps = ?self.core.state().caps.acknowledged,
                "capability negotiation finished"
            );
        }

        self.publish_snapshot();
        write(transport, out.lines).await?;

        if out.registered {
            self.attempts = 0;
            self.registration.cancel();
            if !self.pending.is_empty() {
                debug!(session = %self.id, lines = self.pending.len(), "flushing queued lines");
                write(transport, self.pending.drain(..).collect()).await?;
            }
        }

        for event in &out.events {
            self.registry.publish(self.id, event);
        }

        if out.registered {
            info!(session = %self.id, nickname = %self.core.state().nickname, "registered");
            if let Some(ready) = self.ready.take() {
                let _ = ready.send(Ok(self.id));
            }
        }
        Ok(())
    }

    /// Wait out the reconnect delay. `false` means stop.
    async fn backoff(&mut self) -> bool {
        let Some(delay) = self.config.reconnect.delay(self.attempts) else {
            warn!(
                session = %self.id,
                attempts = self.attempts,
                discarded = self.pending.len(),
                "giving up reconnecting"
            );
            self.pending.clear();
            return false;
        };
        self.attempts += 1;
        self.transition(ConnectionState::Reconnecting, None);
        debug!(session = %self.id, attempt = self.attempts, ?delay, "reconnecting");

        let mut timer = Deadline::default();
        timer.arm(delay);
        loop {
            tokio::select! {
                _ = timer.expired() => return true,
                command = self.commands.recv() => {
                    if !self.idle_command(command) {
                        return false;
                    }
                }
            }
        }
    }

    /// Hold lines until registration. The oldest are dropped past the limit.
    fn queue(&mut self, lines: Vec<String>) {
        self.pending.extend(lines);
        let excess = self.pending.len().saturating_sub(self.config.max_pending_lines);
        if excess > 0 {
            warn!(session = %self.id, dropped = excess, "pending queue full, dropping oldest lines");
            self.pending.drain(..excess);
        }
    }

    /// A command while there is no transport. `false` means stop.
    fn idle_command(&mut self, command: Option<Command>) -> bool {
        match command {
            Some(Command::Send(lines)) => {
                self.queue(lines);
                true
            }
            Some(Command::MarkRead(channel)) => {
                self.mark_read(&channel);
                true
            }
            Some(Command::Disconnect(_)) => {
                self.shutdown("disconnected");
                false
            }
            None => {
                self.shutdown("session dropped");
                false
            }
        }
    }

    async fn quit(&mut self, transport: &mut Transport, reason: Option<String>) {
        let reason = reason.unwrap_or_else(|| self.config.quit_message.clone());
        if let Err(e) = transport.send(cmd::quit(Some(&reason))).await {
            debug!(session = %self.id, error = %e, "QUIT not sent");
        }
        let _ = transport.close().await;
    }

    fn registration_timed_out(&mut self) {
        warn!(session = %self.id, address = %self.server.address(), "registration timed out");
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Err(ClientError::RegistrationTimeout {
                address: self.server.address(),
            }));
        }
        self.shutdown("registration timed out");
    }

    /// Final teardown: the actor returns right after.
    fn shutdown(&mut self, reason: &str) {
        self.core.transport_closed();
        self.attempts = 0;
        self.pending.clear();
        self.publish_snapshot();
        self.transition(ConnectionState::Disconnected, Some(reason.to_string()));
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Err(ClientError::Cancelled {
                address: self.server.address(),
            }));
        }
    }

    fn mark_read(&mut self, channel: &str) {
        if self.core.mark_read(channel) {
            self.publish_snapshot();
        }
    }

    fn publish_snapshot(&self) {
        *self.shared.state.write() = self.core.state().clone();
    }

    fn transition(&mut self, next: ConnectionState, reason: Option<String>) {
        let previous = *self.shared.connection.read();
        if !previous.can_transition_to(next) {
            debug!(session = %self.id, %previous, %next, "ignoring illegal transition");
            return;
        }
        *self.shared.connection.write() = next;
        info!(session = %self.id, %previous, current = %next, "connection state changed");
        self.registry.publish(
            self.id,
            &ConnectionStateChanged {
                previous,
                current: next,
                reason,
            }
            .into(),
        );
    }
}

async fn write(transport: &mut Transport, lines: Vec<String>) -> Result<(), String> {
    if lines.is_empty() {
        return Ok(());
    }
    for line in lines {
        transport.feed(line).await.map_err(|e| e.to_string())?;
    }
    transport.flush().await.map_err(|e| e.to_string())
}
