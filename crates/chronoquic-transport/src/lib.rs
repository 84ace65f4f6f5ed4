//! QUIC transport for chronoquic.
//!
//! This is the lowest layer. It binds a QUIC endpoint secured with TLS 1.3,
//! completes handshakes, and hands out ordered, reliable, bidirectional
//! streams. Everything above builds on the [`QuicStream`] halves provided
//! here.
//!
//! TLS material is always loaded before a socket is bound.

pub mod config;
pub mod error;
pub mod quic;
pub mod stream;
pub mod tls;

pub use config::{
    ClientTransportConfig, TransportConfig, DEFAULT_CERT_PATH, DEFAULT_HOST, DEFAULT_KEY_PATH,
    DEFAULT_PORT, DEFAULT_SERVER_NAME,
};
pub use error::{Result, TransportError};
pub use quic::{connect, QuicConnecting, QuicConnection, QuicListener, CLOSE_NORMAL};
pub use stream::{QuicStream, StreamReader, StreamWriter};
pub use tls::{
    generate_self_signed, load_cert_chain, load_private_key, load_root_store,
    self_signed_material, GeneratedMaterial, TlsMaterial,
};
