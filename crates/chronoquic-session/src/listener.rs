use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chronoquic_transport::{
    QuicConnecting, QuicListener, TransportConfig, TransportError, CLOSE_NORMAL,
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::handler::RequestHandler;
use crate::responder::{serve_session, SessionConfig};

/// Accepts QUIC connections and runs one responder session per
/// bidirectional stream.
pub struct SessionListener {
    listener: QuicListener,
    session_config: SessionConfig,
    next_session_id: Arc<AtomicU64>,
}

impl SessionListener {
    /// Load TLS material and bind. Must be called inside a tokio runtime.
    pub fn bind(config: TransportConfig) -> chronoquic_transport::Result<Self> {
        Ok(Self::from_listener(QuicListener::bind(config)?))
    }

    /// Wrap an already bound listener.
    pub fn from_listener(listener: QuicListener) -> Self {
        Self {
            listener,
            session_config: SessionConfig::default(),
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Override session behavior.
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires, then drain every session,
    /// give peers `close_linger` to hang up and close the endpoint.
    pub async fn serve(
        self,
        handler: Arc<dyn RequestHandler>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let connections = TaskTracker::new();
        info!(
            local_addr = %self.local_addr(),
            transport = self.listener.transport_name(),
            "accepting sessions"
        );

        loop {
            let connecting = tokio::select! {
                _ = shutdown.cancelled() => break,
                connecting = self.listener.accept() => connecting,
            };
            match connecting {
                Ok(connecting) => {
                    connections.spawn(serve_connection(
                        connecting,
                        Arc::clone(&handler),
                        self.session_config.clone(),
                        shutdown.clone(),
                        Arc::clone(&self.next_session_id),
                    ));
                }
                Err(TransportError::Shutdown) => {
                    debug!("endpoint closed");
                    break;
                }
                Err(err) => warn!(error = %err, "accept failed"),
            }
        }

        info!(connections = connections.len(), "shutting down listener");
        connections.close();
        connections.wait().await;
        self.listener.close(CLOSE_NORMAL, b"server shutdown");
        self.listener.wait_idle().await;
        info!("listener stopped");

        if shutdown.is_cancelled() {
            Ok(())
        } else {
            Err(SessionError::Transport(TransportError::Shutdown))
        }
    }
}

async fn serve_connection(
    connecting: QuicConnecting,
    handler: Arc<dyn RequestHandler>,
    config: SessionConfig,
    shutdown: CancellationToken,
    next_session_id: Arc<AtomicU64>,
) {
    let remote = connecting.remote_address();
    let connection = tokio::select! {
        _ = shutdown.cancelled() => return,
        established = connecting.establish() => match established {
            Ok(connection) => connection,
            Err(err) => {
                debug!(%remote, error = %err, "handshake failed");
                return;
            }
        },
    };
    info!(%remote, connection = connection.stable_id(), "connection established");

    let sessions = TaskTracker::new();
    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            stream = connection.accept_stream() => stream,
        };
        let stream = match stream {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                debug!(%remote, "connection closed by peer");
                break;
            }
            Err(err) => {
                debug!(%remote, error = %err, "connection lost");
                break;
            }
        };

        let session_id = next_session_id.fetch_add(1, Ordering::Relaxed);
        debug!(%remote, session = session_id, quic_stream = stream.id(), "session opened");
        let (reader, writer) = stream.into_split();
        let handler = Arc::clone(&handler);
        let config = config.clone();
        let shutdown = shutdown.clone();
        sessions.spawn(async move {
            match serve_session(reader, writer, handler, config, shutdown, session_id).await {
                Ok(()) => debug!(session = session_id, "session closed"),
                Err(err) => info!(session = session_id, error = %err, "session ended with error"),
            }
        });
    }

    sessions.close();
    sessions.wait().await;

    if shutdown.is_cancelled() {
        // Let the peer read the CONNECTION_CLOSE frames and hang up first.
        if tokio::time::timeout(config.close_linger, connection.closed())
            .await
            .is_err()
        {
            connection.close(CLOSE_NORMAL, b"server shutdown");
        }
    }
    debug!(%remote, "connection finished");
}
