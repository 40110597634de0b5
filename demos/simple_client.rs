//! Simple IRC client example
//!
//! Connects to a server, joins a channel, greets it and prints traffic for a
//! minute before quitting.
//!
//! ```text
//! RUST_LOG=slirc_client=debug cargo run --example simple_client -- ircs://irc.libera.chat '#slirc'
//! ```

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use slirc_client::event::{
    ConnectionStateChanged, Joined, MessageReceived, MultilineMessage, Registered, TopicChanged,
};
use slirc_client::{ClientConfig, ServerConfig, SessionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "irc://irc.libera.chat".to_string());
    let channel = args.next().unwrap_or_else(|| "#slirc".to_string());

    let manager = SessionManager::new(ClientConfig::default());
    let events = manager.events();
    events.on(|session, change: &ConnectionStateChanged| {
        println!("[{}] {} -> {}", session, change.previous, change.current);
    });
    events.on(|_, registered: &Registered| {
        println!("✓ registered as {} on {}", registered.nickname, registered.server);
    });
    events.on(|_, joined: &Joined| {
        if joined.is_self {
            println!("→ joined {}", joined.channel);
        }
    });
    events.on(|_, topic: &TopicChanged| {
        if let Some(text) = &topic.topic {
            println!("topic {}: {}", topic.channel, text);
        }
    });
    events.on(|_, msg: &MessageReceived| {
        println!("{} <{}> {}", msg.target, msg.source.name, msg.text);
    });
    events.on(|_, msg: &MultilineMessage| {
        println!("{} <{}>", msg.target, msg.source.name);
        for line in msg.body.lines() {
            println!("    {}", line);
        }
    });

    let server = ServerConfig::from_address(&address, "slirc_example")?;
    let session = manager
        .connect(server)
        .await
        .with_context(|| format!("connecting to {}", address))?;

    manager.join(session, &channel, None)?;
    manager.send_message(session, &channel, "Hello from slirc-client!")?;

    tokio::time::sleep(Duration::from_secs(60)).await;

    manager.disconnect(session, Some("example finished"))?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
