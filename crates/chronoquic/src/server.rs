use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chronoquic_session::{RequestHandler, SessionListener};
use tokio::runtime::Runtime;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::handler::DateTimeHandler;

const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

type ServeResult = std::result::Result<chronoquic_session::Result<()>, JoinError>;

/// A running date-format server that owns its tokio runtime.
///
/// The methods here block the calling thread and must not be called from
/// inside another runtime.
pub struct Server {
    runtime: Option<Runtime>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<chronoquic_session::Result<()>>>,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind and start serving [`DateTimeHandler`] requests.
    pub fn start(config: ServerConfig) -> Result<Self> {
        let handler = DateTimeHandler::new().with_processing_delay(config.processing_delay);
        Self::start_with_handler(config, Arc::new(handler))
    }

    /// Bind and start serving with a custom handler.
    ///
    /// TLS material is loaded and the socket bound before this returns; on
    /// error nothing is left running.
    pub fn start_with_handler(
        config: ServerConfig,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("chronoquic-worker")
            .enable_all()
            .build()
            .map_err(ServerError::Runtime)?;

        let listener = {
            let _guard = runtime.enter();
            SessionListener::bind(config.transport)?
        }
        .with_session_config(config.session);
        let local_addr = listener.local_addr();

        let shutdown = CancellationToken::new();
        let task = runtime.spawn(listener.serve(handler, shutdown.clone()));
        info!(%local_addr, workers = config.worker_threads.max(1), "server started");

        Ok(Self {
            runtime: Some(runtime),
            shutdown,
            task: Some(task),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop accepting, drain in-flight exchanges and shut the runtime down.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.cancel();
        let result = match (self.runtime.as_ref(), self.task.take()) {
            (Some(runtime), Some(task)) => flatten(runtime.block_on(task)),
            _ => Ok(()),
        };
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
        }
        info!(local_addr = %self.local_addr, "server stopped");
        result
    }

    /// Serve until Ctrl-C or the shutdown token fires, then [`stop`](Self::stop).
    pub fn run_until_signal(mut self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        let wake = match (self.runtime.as_ref(), self.task.as_mut()) {
            (Some(runtime), Some(task)) => runtime.block_on(async {
                tokio::select! {
                    signal = tokio::signal::ctrl_c() => Wake::Signal(signal),
                    _ = shutdown.cancelled() => Wake::Stopped,
                    joined = task => Wake::Exited(joined),
                }
            }),
            _ => Wake::Stopped,
        };

        match wake {
            Wake::Signal(Ok(())) => {
                info!("interrupt received, shutting down");
                self.stop()
            }
            Wake::Signal(Err(err)) => {
                warn!(error = %err, "signal handler failed, shutting down");
                self.stop()?;
                Err(ServerError::Signal(err))
            }
            Wake::Stopped => self.stop(),
            Wake::Exited(joined) => {
                self.task = None;
                let served = flatten(joined);
                self.stop()?;
                served
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

enum Wake {
    Signal(std::io::Result<()>),
    Stopped,
    Exited(ServeResult),
}

fn flatten(joined: ServeResult) -> Result<()> {
    match joined {
        Ok(served) => served.map_err(ServerError::from),
        Err(err) => Err(ServerError::Task(err.to_string())),
    }
}
