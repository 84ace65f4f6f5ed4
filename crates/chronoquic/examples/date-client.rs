//! Sends a few date-format requests concurrently and prints the answers.
//!
//! Run with:
//!   cargo run --example date-client -- 5000 "%H:%M:%S"

use chronoquic::frame::Payload;
use chronoquic::session::{connect, ClientConfig};
use chronoquic::transport::ClientTransportConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => chronoquic::transport::DEFAULT_PORT,
    };
    let patterns: Vec<String> = match args.next() {
        Some(pattern) => vec![pattern],
        None => vec!["%Y-%m-%d".into(), "%H:%M:%S".into(), "%A %e %B".into()],
    };

    let client = connect(ClientConfig {
        transport: ClientTransportConfig {
            port,
            ..ClientTransportConfig::default()
        },
        ..ClientConfig::default()
    })
    .await?;
    eprintln!("Connected to {}", client.remote_address());

    // All requests share one session and complete in roughly one delay.
    let requests = patterns
        .iter()
        .map(|pattern| client.request_response(Payload::from(pattern.clone())));
    let responses = futures_util::future::join_all(requests).await;

    for (pattern, response) in patterns.iter().zip(responses) {
        match response {
            Ok(payload) => println!("{pattern:>12} => {}", payload.data_utf8()?),
            Err(err) => eprintln!("{pattern:>12} failed: {err}"),
        }
    }

    client.close().await?;
    Ok(())
}
