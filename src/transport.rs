//! Transports that carry IRC lines.
//!
//! A [`Connector`] opens a full-duplex byte stream to a server; the session
//! actor frames it with [`LineCodec`](crate::line::LineCodec). The default
//! [`TcpConnector`] enables TCP keepalive and, for TLS servers, wraps the
//! socket with rustls using the platform's root certificates. Tests supply
//! their own connector backed by in-memory pipes.

use std::io;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig as TlsConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::client::ServerConfig;

/// Byte stream returned by a [`Connector`].
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens transports for the session actor.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, server: &ServerConfig) -> io::Result<BoxedStream>;
}

/// Plain TCP or TLS over TCP.
#[derive(Default)]
pub struct TcpConnector {
    tls: OnceLock<Arc<TlsConfig>>,
}

impl std::fmt::Debug for TcpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnector")
            .field("tls_ready", &self.tls.get().is_some())
            .finish()
    }
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom rustls configuration instead of the native root store.
    pub fn with_tls_config(config: Arc<TlsConfig>) -> Self {
        let tls = OnceLock::new();
        let _ = tls.set(config);
        TcpConnector { tls }
    }

    fn tls_config(&self) -> Arc<TlsConfig> {
        Arc::clone(self.tls.get_or_init(|| Arc::new(native_tls_config())))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, server: &ServerConfig) -> io::Result<BoxedStream> {
        let stream = TcpStream::connect((server.host.as_str(), server.port)).await?;
        if let Err(e) = enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }
        stream.set_nodelay(true)?;

        if !server.tls {
            debug!(address = %server.address(), "tcp connected");
            return Ok(Box::new(stream));
        }

        let name = ServerName::try_from(server.host.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let tls = TlsConnector::from(self.tls_config())
            .connect(name, stream)
            .await?;
        debug!(address = %server.address(), "tls handshake complete");
        Ok(Box::new(tls))
    }
}

fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

fn native_tls_config() -> TlsConfig {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!("failed to add root cert: {}", e);
        }
    }
    for e in &certs.errors {
        warn!("error loading native certs: {}", e);
    }
    TlsConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}
