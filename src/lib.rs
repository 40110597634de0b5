//! # slirc-client
//!
//! An IRC client engine with IRCv3 support: concurrent server sessions,
//! capability negotiation and SASL, `draft/multiline` batches and typed
//! events.
//!
//! ## Layout
//!
//! - [`message`]: line grammar, tags and sources
//! - [`negotiation`], [`caps`], [`sasl`]: the sans-IO handshake
//! - [`ircv3::batch`]: batch reassembly
//! - [`encode`]: one function per outbound command
//! - [`state`], [`session`]: per-session state and the inbound pipeline
//! - [`event`], [`dispatch`]: the closed event enum and its subscribers
//! - `client`, `transport`, `line` (feature `tokio`): the async runtime side
//!
//! Everything except the last group is runtime-agnostic and can be driven
//! line by line, which is how most of the test-suite exercises it.

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Parsing
//!
//! ```rust
//! use slirc_client::Message;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message = Message::parse(raw, "irc.example.net").expect("valid line");
//!
//! assert_eq!(message.command, "PRIVMSG");
//! assert_eq!(message.source.name, "nick");
//! assert_eq!(message.params, ["#channel", "Hello!"]);
//! ```
//!
//! ## Driving a session without I/O
//!
//! ```rust
//! use chrono::Utc;
//! use slirc_client::event::Event;
//! use slirc_client::negotiation::{NegotiationConfig, NEGOTIATION_TIMEOUT};
//! use slirc_client::session::SessionCore;
//!
//! let mut core = SessionCore::new(
//!     "irc.example.net",
//!     NegotiationConfig {
//!         nickname: "me".into(),
//!         username: "me".into(),
//!         realname: "Me".into(),
//!         password: None,
//!         desired: vec![],
//!         sasl: None,
//!         timeout: NEGOTIATION_TIMEOUT,
//!     },
//! );
//! let hello = core.begin();
//! assert_eq!(hello.lines, ["CAP LS 302", "NICK me", "USER me 0 * :Me"]);
//!
//! let out = core.handle_line(":irc.example.net 001 me :Welcome", Utc::now());
//! assert!(matches!(out.events[0], Event::Registered(_)));
//! ```

pub mod caps;
pub mod casemap;
pub mod dispatch;
pub mod encode;
pub mod error;
pub mod event;
pub mod ircv3;
pub mod isupport;
pub mod message;
pub mod negotiation;
pub mod sasl;
pub mod session;
pub mod state;
pub mod util;

#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod client;
#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod line;
#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod transport;

pub use self::caps::{Capabilities, Capability};
pub use self::casemap::{irc_eq, irc_to_lower};
pub use self::dispatch::{EventRegistry, SubscriptionId};
pub use self::error::{ClientError, MessageParseError, ProtocolError};
pub use self::event::{Event, EventKind, EventPayload, SessionId};
pub use self::message::{Message, Source};
pub use self::sasl::{SaslCredentials, SaslMechanism};
pub use self::state::{ConnectionState, SessionState};

#[cfg(feature = "tokio")]
pub use self::client::{ClientConfig, ReconnectPolicy, ServerConfig, SessionManager};
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
#[cfg(feature = "tokio")]
pub use self::transport::{BoxedStream, Connector, TcpConnector};
