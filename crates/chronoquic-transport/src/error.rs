use std::net::SocketAddr;
use std::path::PathBuf;

/// Errors that can occur in QUIC transport setup and operation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured host name could not be resolved.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    /// The configured host name resolved to no usable address.
    #[error("no socket address found for {addr}")]
    NoAddress { addr: String },

    /// Failed to bind the UDP socket backing the endpoint.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The client endpoint refused to start a connection attempt.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: quinn::ConnectError,
    },

    /// The QUIC/TLS handshake with a remote peer failed.
    #[error("handshake with {remote} failed: {source}")]
    Handshake {
        remote: SocketAddr,
        source: quinn::ConnectionError,
    },

    /// An established connection failed.
    #[error("connection error: {0}")]
    Connection(#[from] quinn::ConnectionError),

    /// Certificate or key file could not be read.
    #[error("failed to read TLS material {path}: {source}")]
    TlsMaterial {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The certificate file contained no PEM certificate.
    #[error("no certificate found in {path}")]
    MissingCertificate { path: PathBuf },

    /// The key file contained no supported PEM private key.
    #[error("no private key found in {path}")]
    MissingPrivateKey { path: PathBuf },

    /// rustls rejected the certificate material.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// The client could not build a certificate verifier from the trust anchors.
    #[error("certificate verifier error: {0}")]
    Verifier(String),

    /// Self-signed certificate generation failed.
    #[error("certificate generation failed: {0}")]
    Generate(String),

    /// A configuration value is outside what QUIC accepts.
    #[error("invalid transport config: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns true for errors raised while preparing the listener, before any
    /// connection is accepted.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            TransportError::Resolve { .. }
                | TransportError::NoAddress { .. }
                | TransportError::Bind { .. }
                | TransportError::TlsMaterial { .. }
                | TransportError::MissingCertificate { .. }
                | TransportError::MissingPrivateKey { .. }
                | TransportError::Tls(_)
                | TransportError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
