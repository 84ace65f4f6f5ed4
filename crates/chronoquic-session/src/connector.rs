use std::net::SocketAddr;

use chronoquic_frame::Payload;
use chronoquic_transport::{ClientTransportConfig, QuicConnection, CLOSE_NORMAL};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::requester::{Requester, RequesterConfig};
use crate::setup::SetupConfig;

/// Everything needed to open a client session.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub transport: ClientTransportConfig,
    pub setup: SetupConfig,
    pub requester: RequesterConfig,
}

/// A client session on its own QUIC connection.
pub struct Client {
    connection: QuicConnection,
    requester: Requester,
}

/// Connect with default settings to `host:port`, trusting `ca_cert_path`.
pub async fn connect(config: ClientConfig) -> Result<Client> {
    let connection = chronoquic_transport::connect(&config.transport).await?;
    let stream = connection.open_stream().await?;
    debug!(
        remote = %connection.remote_address(),
        quic_stream = stream.id(),
        "session stream opened"
    );
    let (reader, writer) = stream.into_split();
    let requester = Requester::start(reader, writer, config.setup, config.requester).await?;
    Ok(Client {
        connection,
        requester,
    })
}

impl Client {
    /// See [`Requester::request_response`].
    pub async fn request_response(&self, payload: Payload) -> Result<Payload> {
        self.requester.request_response(payload).await
    }

    /// See [`Requester::request_response_with_cancel`].
    pub async fn request_response_with_cancel(
        &self,
        payload: Payload,
        cancel: CancellationToken,
    ) -> Result<Payload> {
        self.requester
            .request_response_with_cancel(payload, cancel)
            .await
    }

    /// See [`Requester::fire_and_forget`].
    pub async fn fire_and_forget(&self, payload: Payload) -> Result<()> {
        self.requester.fire_and_forget(payload).await
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    /// Finish the session stream, then close the connection.
    pub async fn close(self) -> Result<()> {
        let result = self.requester.close().await;
        self.connection.close(CLOSE_NORMAL, b"client closing");
        self.connection.wait_idle().await;
        result
    }
}
