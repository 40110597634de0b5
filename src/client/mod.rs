//! Session manager on top of tokio.
//!
//! [`SessionManager`] owns every session and the shared
//! [`EventRegistry`]. Each session runs as its own task (see `actor`);
//! the manager talks to it through an unbounded command channel and reads
//! the snapshots it publishes.
//!
//! ```no_run
//! use slirc_client::{ClientConfig, ServerConfig, SessionManager};
//! use slirc_client::event::MessageReceived;
//!
//! # async fn demo() -> Result<(), slirc_client::ClientError> {
//! let manager = SessionManager::new(ClientConfig::default());
//! manager.events().on(|_, msg: &MessageReceived| println!("<{}> {}", msg.source.name, msg.text));
//!
//! let server = ServerConfig::from_address("ircs://irc.libera.chat", "slirc-demo")?;
//! let session = manager.connect(server).await?;
//! manager.join(session, "#slirc", None)?;
//! # Ok(())
//! # }
//! ```

mod actor;
mod backoff;
mod commands;
mod config;
mod timer;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::dispatch::EventRegistry;
use crate::error::{ClientError, Result};
use crate::event::SessionId;
use crate::state::{ConnectionState, SessionState};
use crate::transport::{Connector, TcpConnector};

use self::actor::{Command, SessionActor, SessionShared};

pub use self::backoff::ReconnectPolicy;
pub use self::config::{ClientConfig, ServerConfig, DEFAULT_PORT, DEFAULT_TLS_PORT};

type Outcome = Shared<BoxFuture<'static, Result<SessionId>>>;

struct SessionHandle {
    address: String,
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<SessionShared>,
    task: JoinHandle<()>,
}

/// A `connect` in flight, shared by every caller for the same address.
struct PendingConnect {
    session: SessionId,
    outcome: Outcome,
    interest: Arc<AtomicUsize>,
}

struct Inner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<EventRegistry>,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    pending: Mutex<HashMap<String, PendingConnect>>,
}

/// Owner of all client sessions.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.inner.sessions.lock().len())
            .field("pending", &self.inner.pending.lock().len())
            .finish()
    }
}

impl SessionManager {
    /// Manager using plain TCP / rustls transports.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, TcpConnector::new())
    }

    /// Manager using a custom transport.
    pub fn with_connector(config: ClientConfig, connector: impl Connector) -> Self {
        SessionManager {
            inner: Arc::new(Inner {
                config,
                connector: Arc::new(connector),
                registry: Arc::new(EventRegistry::new()),
                next_id: AtomicU64::new(1),
                sessions: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscription table shared by every session.
    pub fn events(&self) -> &EventRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Open a session and wait for the server to accept registration.
    ///
    /// Concurrent calls for the same `host:port` share one attempt and one
    /// outcome. The attempt is abandoned only when every caller has dropped
    /// its future.
    pub async fn connect(&self, server: ServerConfig) -> Result<SessionId> {
        let address = server.address();
        let (session, outcome, interest) = {
            let mut pending = self.inner.pending.lock();
            match pending.get(&address) {
                Some(attempt) => {
                    attempt.interest.fetch_add(1, Ordering::SeqCst);
                    debug!(%address, session = %attempt.session, "joining pending connect");
                    (
                        attempt.session,
                        attempt.outcome.clone(),
                        Arc::clone(&attempt.interest),
                    )
                }
                None => {
                    let (session, outcome) = self.inner.spawn(server);
                    let interest = Arc::new(AtomicUsize::new(1));
                    pending.insert(
                        address.clone(),
                        PendingConnect {
                            session,
                            outcome: outcome.clone(),
                            interest: Arc::clone(&interest),
                        },
                    );
                    (session, outcome, interest)
                }
            }
        };

        let mut guard = InterestGuard {
            inner: &self.inner,
            address,
            session,
            interest,
            settled: false,
        };
        let result = outcome.await;
        guard.settle(&result);
        result
    }

    /// Send `QUIT`, close the transport and stop every timer of the session.
    /// Calling it again is a no-op.
    pub fn disconnect(&self, session: SessionId, reason: Option<&str>) -> Result<()> {
        self.command(session, Command::Disconnect(reason.map(str::to_string)))
    }

    /// Disconnect and forget a session. The task finishes in the background
    /// after sending `QUIT`.
    pub fn remove(&self, session: SessionId) -> Result<()> {
        let handle = self
            .inner
            .sessions
            .lock()
            .remove(&session)
            .ok_or(ClientError::UnknownSession(session))?;
        self.inner.forget_pending(&handle.address, session);
        if handle.commands.send(Command::Disconnect(None)).is_err() {
            handle.task.abort();
        }
        debug!(%session, address = %handle.address, "session removed");
        Ok(())
    }

    pub fn connection_state(&self, session: SessionId) -> Result<ConnectionState> {
        self.with_handle(session, |h| *h.shared.connection.read())
    }

    /// Copy of the session's current state.
    pub fn snapshot(&self, session: SessionId) -> Result<SessionState> {
        self.with_handle(session, |h| h.shared.state.read().clone())
    }

    /// Ids of every known session.
    pub fn sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.inner.sessions.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    fn with_handle<T>(&self, session: SessionId, f: impl FnOnce(&SessionHandle) -> T) -> Result<T> {
        self.inner
            .sessions
            .lock()
            .get(&session)
            .map(f)
            .ok_or(ClientError::UnknownSession(session))
    }

    fn command(&self, session: SessionId, command: Command) -> Result<()> {
        self.with_handle(session, |h| {
            if h.commands.send(command).is_err() {
                debug!(%session, "session task has stopped; command dropped");
            }
        })
    }
}

impl Inner {
    /// Start a session task and return the future of its first registration.
    fn spawn(&self, server: ServerConfig) -> (SessionId, Outcome) {
        let session = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let address = server.address();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let shared = Arc::new(SessionShared::default());

        let actor = SessionActor::new(
            session,
            server,
            self.config.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&self.registry),
            Arc::clone(&shared),
            commands_rx,
            ready_tx,
        );
        let task = tokio::spawn(actor.run());
        self.sessions.lock().insert(
            session,
            SessionHandle {
                address: address.clone(),
                commands: commands_tx,
                shared,
                task,
            },
        );

        let outcome = async move {
            ready_rx
                .await
                .unwrap_or(Err(ClientError::Cancelled { address }))
        }
        .boxed()
        .shared();
        (session, outcome)
    }

    fn forget_pending(&self, address: &str, session: SessionId) {
        let mut pending = self.pending.lock();
        if pending.get(address).map(|p| p.session) == Some(session) {
            pending.remove(address);
        }
    }
}

/// One caller's interest in a pending connect.
struct InterestGuard<'a> {
    inner: &'a Inner,
    address: String,
    session: SessionId,
    interest: Arc<AtomicUsize>,
    settled: bool,
}

impl InterestGuard<'_> {
    fn settle(&mut self, result: &Result<SessionId>) {
        self.settled = true;
        self.interest.fetch_sub(1, Ordering::SeqCst);
        self.inner.forget_pending(&self.address, self.session);
        if result.is_err() {
            self.inner.sessions.lock().remove(&self.session);
        }
    }
}

impl Drop for InterestGuard<'_> {
    fn drop(&mut self) {
        if self.settled || self.interest.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        debug!(address = %self.address, session = %self.session, "connect abandoned by every caller");
        self.inner.forget_pending(&self.address, self.session);
        if let Some(handle) = self.inner.sessions.lock().remove(&self.session) {
            handle.task.abort();
        }
    }
}
