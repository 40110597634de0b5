//! In-memory server harness for the session manager tests.
//!
//! [`DuplexConnector`] hands the manager one half of a `tokio::io::duplex`
//! pipe per connection attempt and sends the other half to the test, which
//! wraps it in a [`FakeServer`].

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use slirc_client::event::{ConnectionStateChanged, Event, EventKind, SessionId};
use slirc_client::{
    BoxedStream, ClientConfig, ConnectionState, Connector, LineCodec, ServerConfig,
    SessionManager,
};

pub const HOST: &str = "irc.test";
pub const PORT: u16 = 6667;
pub const ADDRESS: &str = "irc.test:6667";

pub fn server() -> ServerConfig {
    ServerConfig::new(HOST, PORT, "me")
}

// =============================================================================
// CONNECTOR
// =============================================================================

pub struct DuplexConnector {
    servers: mpsc::UnboundedSender<DuplexStream>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn connect(&self, _server: &ServerConfig) -> io::Result<BoxedStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ));
        }
        let (client, server) = tokio::io::duplex(64 * 1024);
        self.servers
            .send(server)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "harness dropped"))?;
        Ok(Box::new(client))
    }
}

/// A manager wired to in-memory servers.
pub struct Harness {
    pub manager: SessionManager,
    servers: mpsc::UnboundedReceiver<DuplexStream>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
}

impl Harness {
    pub fn new(config: ClientConfig) -> Self {
        let (tx, servers) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let refuse = Arc::new(AtomicBool::new(false));
        let connector = DuplexConnector {
            servers: tx,
            attempts: Arc::clone(&attempts),
            refuse: Arc::clone(&refuse),
        };
        Harness {
            manager: SessionManager::with_connector(config, connector),
            servers,
            attempts,
            refuse,
        }
    }

    /// Wait for the next connection attempt.
    pub async fn accept(&mut self) -> FakeServer {
        let stream = self.servers.recv().await.expect("connector dropped");
        FakeServer {
            framed: Framed::new(stream, LineCodec::new()),
        }
    }

    /// Number of times the connector was called.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make every following connection attempt fail.
    pub fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Forward every event of the given kinds to a channel.
    pub fn events(&self, kinds: &[EventKind]) -> mpsc::UnboundedReceiver<(SessionId, Event)> {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in kinds {
            let tx = tx.clone();
            self.manager.events().subscribe(*kind, move |session, event| {
                let _ = tx.send((session, event.clone()));
            });
        }
        rx
    }
}

/// Wait for the next state change into `state`.
pub async fn wait_for_state(
    events: &mut mpsc::UnboundedReceiver<(SessionId, Event)>,
    state: ConnectionState,
) -> ConnectionStateChanged {
    loop {
        match events.recv().await.expect("event channel closed") {
            (_, Event::ConnectionStateChanged(change)) if change.current == state => {
                return change
            }
            _ => {}
        }
    }
}

// =============================================================================
// FAKE SERVER
// =============================================================================

pub struct FakeServer {
    framed: Framed<DuplexStream, LineCodec>,
}

impl FakeServer {
    /// Next raw line from the client, `None` once it hung up.
    pub async fn recv(&mut self) -> Option<String> {
        self.framed
            .next()
            .await
            .map(|line| line.expect("client sent an undecodable line"))
    }

    pub async fn send(&mut self, line: &str) {
        self.framed
            .send(line.to_string())
            .await
            .expect("client hung up");
    }

    /// Next line that is not a keepalive `PING` (those get answered).
    pub async fn next_line(&mut self) -> String {
        loop {
            let line = self.recv().await.expect("client hung up");
            match line.strip_prefix("PING ") {
                Some(token) => self.send(&format!(":{} PONG {} {}", HOST, HOST, token)).await,
                None => return line,
            }
        }
    }

    /// Assert the next non-`PING` line.
    pub async fn expect(&mut self, expected: &str) {
        assert_eq!(self.next_line().await, expected);
    }

    /// Read lines until the client hangs up.
    pub async fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.recv().await {
            lines.push(line);
        }
        lines
    }

    /// Complete a registration without capabilities.
    pub async fn register(&mut self, nick: &str) {
        self.expect("CAP LS 302").await;
        self.expect(&format!("NICK {}", nick)).await;
        self.expect(&format!("USER {} 0 * :{}", nick, nick)).await;
        self.send("CAP * LS :").await;
        self.expect("CAP END").await;
        self.send(&format!(":{} 001 {} :Welcome to the test network", HOST, nick))
            .await;
    }
}
