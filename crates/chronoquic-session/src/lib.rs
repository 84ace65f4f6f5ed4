//! RSocket request/response sessions over QUIC streams.
//!
//! One bidirectional QUIC stream carries one session. The responder side
//! validates SETUP, dispatches requests to a shared [`RequestHandler`] and
//! answers every accepted request exactly once. The requester side sends
//! SETUP and matches responses to callers by stream id.

pub mod connector;
pub mod error;
pub mod handler;
pub mod listener;
pub mod requester;
pub mod responder;
pub mod setup;
mod writer;

pub use connector::{connect, Client, ClientConfig};
pub use error::{Result, SessionError};
pub use handler::{HandlerError, RequestHandler};
pub use listener::SessionListener;
pub use requester::{Requester, RequesterConfig};
pub use responder::{serve_session, SessionConfig};
pub use setup::{validate_setup, SetupConfig, SetupInfo, SetupRejection};
