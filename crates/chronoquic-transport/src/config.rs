use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Default listen host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Fallback port used when none is configured.
pub const DEFAULT_PORT: u16 = 5000;
/// Default certificate chain path, relative to the working directory.
pub const DEFAULT_CERT_PATH: &str = "../server.crt";
/// Default private key path, relative to the working directory.
pub const DEFAULT_KEY_PATH: &str = "../server.key";
/// Default TLS server name presented by clients.
pub const DEFAULT_SERVER_NAME: &str = "localhost";

/// Server-side transport configuration.
///
/// Passed by value into [`QuicListener::bind`](crate::QuicListener::bind); the
/// listener never mutates it.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Host name or IP literal to bind.
    pub host: String,
    /// UDP port to bind. `0` lets the OS choose.
    pub port: u16,
    /// PEM certificate chain.
    pub cert_path: PathBuf,
    /// PEM private key.
    pub key_path: PathBuf,
    /// Idle time after which QUIC drops a silent connection.
    pub max_idle_timeout: Duration,
    /// QUIC-level PING interval, if any.
    pub keep_alive_interval: Option<Duration>,
    /// Bidirectional streams a peer may have open at once.
    pub max_concurrent_bidi_streams: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cert_path: PathBuf::from(DEFAULT_CERT_PATH),
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
            max_idle_timeout: Duration::from_secs(30),
            keep_alive_interval: None,
            max_concurrent_bidi_streams: 100,
        }
    }
}

impl TransportConfig {
    /// Resolve `host:port` to the first socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        resolve(&self.host, self.port)
    }

    pub(crate) fn quic_transport(&self) -> Result<Arc<quinn::TransportConfig>> {
        build_quic_transport(
            self.max_idle_timeout,
            self.keep_alive_interval,
            self.max_concurrent_bidi_streams,
        )
    }
}

/// Client-side transport configuration.
#[derive(Debug, Clone)]
pub struct ClientTransportConfig {
    /// Server host name or IP literal.
    pub host: String,
    /// Server UDP port.
    pub port: u16,
    /// Name checked against the server certificate.
    pub server_name: String,
    /// PEM certificate(s) trusted as roots for the server.
    pub ca_cert_path: PathBuf,
    /// Idle time after which QUIC drops a silent connection.
    pub max_idle_timeout: Duration,
    /// QUIC-level PING interval, if any.
    pub keep_alive_interval: Option<Duration>,
}

impl Default for ClientTransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            ca_cert_path: PathBuf::from(DEFAULT_CERT_PATH),
            max_idle_timeout: Duration::from_secs(30),
            keep_alive_interval: None,
        }
    }
}

impl ClientTransportConfig {
    /// Resolve `host:port` to the first socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        resolve(&self.host, self.port)
    }

    pub(crate) fn quic_transport(&self) -> Result<Arc<quinn::TransportConfig>> {
        // Clients never accept streams; the server opens none.
        build_quic_transport(self.max_idle_timeout, self.keep_alive_interval, 0)
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let addr = format!("{host}:{port}");
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: addr.clone(),
            source,
        })?;
    addrs.next().ok_or(TransportError::NoAddress { addr })
}

fn build_quic_transport(
    max_idle_timeout: Duration,
    keep_alive_interval: Option<Duration>,
    max_concurrent_bidi_streams: u32,
) -> Result<Arc<quinn::TransportConfig>> {
    let idle = quinn::IdleTimeout::try_from(max_idle_timeout).map_err(|_| {
        TransportError::InvalidConfig(format!(
            "max_idle_timeout {max_idle_timeout:?} exceeds QUIC limits"
        ))
    })?;

    let mut transport = quinn::TransportConfig::default();
    transport
        .max_idle_timeout(Some(idle))
        .keep_alive_interval(keep_alive_interval)
        .max_concurrent_bidi_streams(quinn::VarInt::from_u32(max_concurrent_bidi_streams))
        .max_concurrent_uni_streams(quinn::VarInt::from_u32(0));
    Ok(Arc::new(transport))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = TransportConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.cert_path, PathBuf::from("../server.crt"));
        assert_eq!(config.key_path, PathBuf::from("../server.key"));
    }

    #[test]
    fn resolves_ip_literal() {
        let config = TransportConfig {
            port: 7443,
            ..TransportConfig::default()
        };
        let addr = config.socket_addr().expect("loopback should resolve");
        assert_eq!(addr, "127.0.0.1:7443".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn rejects_unresolvable_host() {
        let config = ClientTransportConfig {
            host: "definitely not a host name".to_string(),
            ..ClientTransportConfig::default()
        };
        assert!(matches!(
            config.socket_addr(),
            Err(TransportError::Resolve { .. })
        ));
    }

    #[test]
    fn rejects_oversized_idle_timeout() {
        let config = TransportConfig {
            max_idle_timeout: Duration::from_secs(u64::MAX / 4),
            ..TransportConfig::default()
        };
        assert!(matches!(
            config.quic_transport(),
            Err(TransportError::InvalidConfig(_))
        ));
    }
}
