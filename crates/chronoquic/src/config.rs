use std::time::Duration;

use chronoquic_session::SessionConfig;
use chronoquic_transport::TransportConfig;

use crate::handler::DEFAULT_PROCESSING_DELAY;

/// Runtime threads used when none are configured.
pub const DEFAULT_WORKER_THREADS: usize = 1;

/// Everything [`Server::start`](crate::Server::start) needs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: TransportConfig,
    pub session: SessionConfig,
    /// Worker threads for the server's own runtime. Zero is treated as one.
    pub worker_threads: usize,
    /// Delay applied to each request before it is answered.
    pub processing_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
            worker_threads: DEFAULT_WORKER_THREADS,
            processing_delay: DEFAULT_PROCESSING_DELAY,
        }
    }
}
