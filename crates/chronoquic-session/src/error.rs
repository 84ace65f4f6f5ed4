use std::time::Duration;

use chronoquic_frame::ErrorCode;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] chronoquic_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] chronoquic_frame::FrameError),

    /// The SETUP frame was rejected (by us as responder, or by the peer).
    #[error("setup rejected ({code}): {message}")]
    SetupRejected { code: ErrorCode, message: String },

    /// The peer violated the protocol and the session was closed.
    #[error("protocol violation ({code}): {message}")]
    Protocol { code: ErrorCode, message: String },

    /// The peer answered with an ERROR frame.
    #[error("remote error ({code}): {message}")]
    Remote { code: ErrorCode, message: String },

    /// No frame arrived within the negotiated max lifetime.
    #[error("no frame received within keepalive lifetime {0:?}")]
    KeepaliveTimeout(Duration),

    /// Peer disconnected.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// Request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Request was canceled before a response arrived.
    #[error("request canceled")]
    Canceled,

    /// All 31-bit client stream ids have been used.
    #[error("stream ids exhausted")]
    StreamIdsExhausted,

    /// The session is shutting down.
    #[error("session shut down")]
    Shutdown,
}

impl SessionError {
    /// Error code carried by the peer's or our own ERROR frame, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::SetupRejected { code, .. }
            | Self::Protocol { code, .. }
            | Self::Remote { code, .. } => Some(*code),
            Self::Canceled => Some(ErrorCode::CANCELED),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
