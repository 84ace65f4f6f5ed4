use async_trait::async_trait;
use chronoquic_frame::{ErrorCode, Payload};

/// Failure returned by a [`RequestHandler`]. Each variant maps to the
/// ERROR frame code sent back to the requester.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// The request could not be understood.
    #[error("{0}")]
    Invalid(String),

    /// The request was understood but refused.
    #[error("{0}")]
    Rejected(String),

    /// The handler failed while processing a valid request.
    #[error("{0}")]
    Application(String),

    /// The interaction model is not implemented by this handler.
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl HandlerError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Invalid(_) => ErrorCode::INVALID,
            Self::Rejected(_) | Self::Unsupported(_) => ErrorCode::REJECTED,
            Self::Application(_) => ErrorCode::APPLICATION_ERROR,
        }
    }
}

/// Application logic behind a responder session.
///
/// One handler instance is shared by every session and every exchange, so
/// implementations must be safe to call concurrently.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Answer a REQUEST_RESPONSE with exactly one payload or an error.
    async fn request_response(&self, payload: Payload) -> Result<Payload, HandlerError> {
        let _ = payload;
        Err(HandlerError::Unsupported("REQUEST_RESPONSE"))
    }

    /// Consume a REQUEST_FNF. Errors are logged, never sent.
    async fn fire_and_forget(&self, payload: Payload) -> Result<(), HandlerError> {
        let _ = payload;
        Err(HandlerError::Unsupported("REQUEST_FNF"))
    }
}
