//! Date-format server on 127.0.0.1.
//!
//! Run with:
//!   cargo run --example date-server -- 5000
//!
//! Expects `server.crt` / `server.key` one directory up; create them with
//!   cargo run -- gencert
//!
//! Then, from another terminal:
//!   cargo run --example date-client -- 5000 "%Y-%m-%d %H:%M:%S"

use chronoquic::transport::TransportConfig;
use chronoquic::{Server, ServerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = match std::env::args().nth(1) {
        Some(port) => port.parse()?,
        None => chronoquic::transport::DEFAULT_PORT,
    };

    let server = Server::start(ServerConfig {
        transport: TransportConfig {
            port,
            ..TransportConfig::default()
        },
        ..ServerConfig::default()
    })?;
    eprintln!("Listening on {} (Ctrl-C to stop)", server.local_addr());

    server.run_until_signal()?;
    Ok(())
}
