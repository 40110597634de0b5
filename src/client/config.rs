//! Server and client configuration.

use std::time::Duration;

use crate::caps::default_capabilities;
use crate::error::ClientError;
use crate::negotiation::{NegotiationConfig, NEGOTIATION_TIMEOUT};
use crate::sasl::SaslCredentials;

use super::backoff::ReconnectPolicy;

pub const DEFAULT_PORT: u16 = 6667;
pub const DEFAULT_TLS_PORT: u16 = 6697;

/// One server to connect to.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub nickname: String,
    pub username: String,
    pub realname: String,
    /// Sent as `PASS` before anything else.
    pub password: Option<String>,
    pub sasl: Option<SaslCredentials>,
    /// Capabilities to request when offered.
    pub capabilities: Vec<String>,
    /// Source assumed for lines that carry none. Defaults to `host`.
    pub server_name: Option<String>,
}

impl ServerConfig {
    /// Plain-text server with the default capability set. Username and
    /// realname default to the nickname.
    pub fn new(host: impl Into<String>, port: u16, nickname: impl Into<String>) -> Self {
        let nickname = nickname.into();
        ServerConfig {
            host: host.into(),
            port,
            tls: false,
            username: nickname.clone(),
            realname: nickname.clone(),
            nickname,
            password: None,
            sasl: None,
            capabilities: default_capabilities()
                .iter()
                .map(ToString::to_string)
                .collect(),
            server_name: None,
        }
    }

    /// Parse `ircs://host:port`, `irc://host:port` or `host[:port]`.
    ///
    /// ```
    /// use slirc_client::ServerConfig;
    ///
    /// let config = ServerConfig::from_address("ircs://irc.libera.chat", "me").unwrap();
    /// assert!(config.tls);
    /// assert_eq!(config.port, 6697);
    /// ```
    pub fn from_address(address: &str, nickname: impl Into<String>) -> Result<Self, ClientError> {
        let invalid = || ClientError::InvalidAddress(address.to_string());
        let (tls, rest) = if let Some(rest) = address.strip_prefix("ircs://") {
            (true, rest)
        } else if let Some(rest) = address.strip_prefix("irc://") {
            (false, rest)
        } else if address.contains("://") {
            return Err(invalid());
        } else {
            (false, address)
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None if tls => (rest, DEFAULT_TLS_PORT),
            None => (rest, DEFAULT_PORT),
        };
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let mut config = ServerConfig::new(host, port, nickname);
        config.tls = tls;
        Ok(config)
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_sasl(mut self, credentials: SaslCredentials) -> Self {
        self.sasl = Some(credentials);
        self
    }

    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = caps.into_iter().map(Into::into).collect();
        self
    }

    /// `host:port`, the key concurrent connects are coalesced on.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_name(&self) -> &str {
        self.server_name.as_deref().unwrap_or(&self.host)
    }

    pub(crate) fn negotiation(&self, timeout: Duration) -> NegotiationConfig {
        NegotiationConfig {
            nickname: self.nickname.clone(),
            username: self.username.clone(),
            realname: self.realname.clone(),
            password: self.password.clone(),
            desired: self.capabilities.clone(),
            sasl: self.sasl.clone(),
            timeout,
        }
    }
}

/// Timings and policies shared by every session of a manager.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// How long to wait for the matching `PONG`.
    pub pong_timeout: Duration,
    /// Safety deadline for each capability negotiation step.
    pub negotiation_timeout: Duration,
    /// Maximum time from `connect` to `001`.
    pub registration_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    /// Sent with `QUIT` when `disconnect` gives no reason.
    pub quit_message: String,
    /// Lines held for an unregistered session before the oldest are dropped.
    pub max_pending_lines: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            negotiation_timeout: NEGOTIATION_TIMEOUT,
            registration_timeout: Duration::from_secs(60),
            reconnect: ReconnectPolicy::default(),
            quit_message: "Leaving".to_string(),
            max_pending_lines: 1024,
        }
    }
}
