use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ClientTransportConfig, TransportConfig};
use crate::error::{Result, TransportError};
use crate::stream::QuicStream;
use crate::tls::{load_root_store, TlsMaterial};

/// Application close code sent when the local side shuts a connection down.
pub const CLOSE_NORMAL: u32 = 0;

/// QUIC server endpoint.
///
/// Binding loads TLS material first and only then opens the UDP socket, so a
/// bad certificate or key never leaves a half-started listener behind.
pub struct QuicListener {
    endpoint: quinn::Endpoint,
    local_addr: SocketAddr,
}

impl QuicListener {
    /// Load TLS material from the configured paths and bind.
    ///
    /// Must be called from within a tokio runtime context.
    pub fn bind(config: TransportConfig) -> Result<Self> {
        let material = TlsMaterial::load(&config.cert_path, &config.key_path)?;
        Self::bind_with_material(config, material)
    }

    /// Bind with TLS material that is already in memory.
    pub fn bind_with_material(config: TransportConfig, material: TlsMaterial) -> Result<Self> {
        let addr = config.socket_addr()?;
        let mut server_config =
            quinn::ServerConfig::with_single_cert(material.cert_chain, material.private_key)?;
        server_config.transport_config(config.quic_transport()?);

        let endpoint = quinn::Endpoint::server(server_config, addr)
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = endpoint.local_addr()?;

        info!(%local_addr, "listening for QUIC connections");
        Ok(Self {
            endpoint,
            local_addr,
        })
    }

    /// Wait for the next incoming connection attempt.
    ///
    /// Returns [`TransportError::Shutdown`] once the endpoint is closed. The
    /// handshake itself runs in [`QuicConnecting::establish`].
    pub async fn accept(&self) -> Result<QuicConnecting> {
        let incoming = self.endpoint.accept().await.ok_or(TransportError::Shutdown)?;
        let remote = incoming.remote_address();
        debug!(%remote, "incoming connection");
        Ok(QuicConnecting { incoming, remote })
    }

    /// Address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Refuse new connections and close existing ones.
    pub fn close(&self, code: u32, reason: &[u8]) {
        self.endpoint.close(quinn::VarInt::from_u32(code), reason);
    }

    /// Wait until every connection on this endpoint is fully closed.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "quic"
    }
}

/// A connection attempt whose handshake has not completed yet.
pub struct QuicConnecting {
    incoming: quinn::Incoming,
    remote: SocketAddr,
}

impl QuicConnecting {
    /// Remote address of the connecting peer.
    pub fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    /// Complete the TLS handshake.
    pub async fn establish(self) -> Result<QuicConnection> {
        let remote = self.remote;
        let connection = self
            .incoming
            .await
            .map_err(|source| TransportError::Handshake { remote, source })?;
        debug!(%remote, "handshake complete");
        Ok(QuicConnection::new(connection, None))
    }
}

/// An established QUIC connection.
#[derive(Clone)]
pub struct QuicConnection {
    inner: quinn::Connection,
    // Client connections keep their endpoint alive for as long as they exist.
    endpoint: Option<quinn::Endpoint>,
}

impl QuicConnection {
    fn new(inner: quinn::Connection, endpoint: Option<quinn::Endpoint>) -> Self {
        Self { inner, endpoint }
    }

    /// Accept the next bidirectional stream opened by the peer.
    ///
    /// Returns `Ok(None)` once the connection has been closed by either side.
    pub async fn accept_stream(&self) -> Result<Option<QuicStream>> {
        match self.inner.accept_bi().await {
            Ok((send, recv)) => Ok(Some(QuicStream::new(send, recv))),
            Err(err) if is_clean_close(&err) => Ok(None),
            Err(err) => Err(TransportError::Connection(err)),
        }
    }

    /// Open a new bidirectional stream.
    pub async fn open_stream(&self) -> Result<QuicStream> {
        let (send, recv) = self.inner.open_bi().await?;
        Ok(QuicStream::new(send, recv))
    }

    /// Remote peer address.
    pub fn remote_address(&self) -> SocketAddr {
        self.inner.remote_address()
    }

    /// Identifier stable for the lifetime of the connection.
    pub fn stable_id(&self) -> usize {
        self.inner.stable_id()
    }

    /// Close immediately with an application error code.
    pub fn close(&self, code: u32, reason: &[u8]) {
        self.inner.close(quinn::VarInt::from_u32(code), reason);
    }

    /// Resolves once the connection is closed, with the reason.
    pub async fn closed(&self) -> quinn::ConnectionError {
        self.inner.closed().await
    }

    /// For client connections, wait until the owned endpoint is idle.
    pub async fn wait_idle(&self) {
        if let Some(endpoint) = &self.endpoint {
            endpoint.wait_idle().await;
        }
    }
}

fn is_clean_close(err: &quinn::ConnectionError) -> bool {
    matches!(
        err,
        quinn::ConnectionError::ApplicationClosed(_)
            | quinn::ConnectionError::ConnectionClosed(_)
            | quinn::ConnectionError::LocallyClosed
    )
}

/// Connect to a QUIC server, trusting the certificates in `ca_cert_path`.
pub async fn connect(config: &ClientTransportConfig) -> Result<QuicConnection> {
    let addr = config.socket_addr()?;
    let roots = load_root_store(&config.ca_cert_path)?;
    let mut client_config = quinn::ClientConfig::with_root_certificates(Arc::new(roots))
        .map_err(|err| TransportError::Verifier(err.to_string()))?;
    client_config.transport_config(config.quic_transport()?);

    let bind_addr: SocketAddr = if addr.is_ipv6() {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    };
    let mut endpoint =
        quinn::Endpoint::client(bind_addr).map_err(|source| TransportError::Bind {
            addr: bind_addr,
            source,
        })?;
    endpoint.set_default_client_config(client_config);

    let connecting = endpoint
        .connect(addr, &config.server_name)
        .map_err(|source| TransportError::Connect { addr, source })?;
    let connection = connecting.await.map_err(|source| TransportError::Handshake {
        remote: addr,
        source,
    })?;

    debug!(remote = %addr, server_name = %config.server_name, "connected");
    Ok(QuicConnection::new(connection, Some(endpoint)))
}
