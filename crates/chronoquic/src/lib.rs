//! Date-format request/response server over RSocket on QUIC.
//!
//! Clients send a strftime-style pattern; the server answers with the
//! current time rendered through it.
//!
//! # Crate Structure
//!
//! - [`transport`]: QUIC endpoints and TLS material
//! - [`frame`]: RSocket frame codec
//! - [`session`]: responder and requester sessions
//! - [`handler`]: the date-format [`RequestHandler`](session::RequestHandler)
//! - [`server`]: a [`Server`] that owns its runtime
//!
//! # Example
//!
//! ```no_run
//! use chronoquic::{Server, ServerConfig};
//!
//! let server = Server::start(ServerConfig::default())?;
//! println!("listening on {}", server.local_addr());
//! server.run_until_signal()?;
//! # Ok::<(), chronoquic::ServerError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use chronoquic_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use chronoquic_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use chronoquic_session::*;
}

pub mod clock;
pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ServerConfig, DEFAULT_WORKER_THREADS};
pub use error::{DateTimeError, Result, ServerError};
pub use handler::{format_timestamp, DateTimeHandler, DEFAULT_PROCESSING_DELAY};
pub use server::Server;
