use std::fmt;
use std::io;

use chronoquic::frame::ErrorCode;
use chronoquic::session::SessionError;
use chronoquic::transport::TransportError;
use chronoquic::ServerError;

// Exit codes follow sysexits / coreutils conventions.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Resolve { source, .. }
        | TransportError::TlsMaterial { source, .. }
        | TransportError::Io(source) => io_error(context, source),
        TransportError::MissingCertificate { .. }
        | TransportError::MissingPrivateKey { .. }
        | TransportError::Tls(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        TransportError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Remote { code, .. } if code == ErrorCode::INVALID => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::Frame(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SessionError::Timeout(_) | SessionError::KeepaliveTimeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        SessionError::SetupRejected { .. } | SessionError::Protocol { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        SessionError::Remote { .. }
        | SessionError::Disconnected(_)
        | SessionError::Canceled
        | SessionError::Shutdown => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn server_error(context: &str, err: ServerError) -> CliError {
    match err {
        ServerError::Transport(err) => transport_error(context, err),
        ServerError::Session(err) => session_error(context, err),
        ServerError::Runtime(source) | ServerError::Signal(source) => io_error(context, source),
        ServerError::Task(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_certificate_file_is_failure() {
        let err = server_error(
            "start failed",
            ServerError::Transport(TransportError::TlsMaterial {
                path: PathBuf::from("../server.crt"),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            }),
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("start failed: "));
        assert!(err.message.contains("server.crt"));
    }

    #[test]
    fn invalid_pattern_is_data_invalid() {
        let err = session_error(
            "request failed",
            SessionError::Remote {
                code: ErrorCode::INVALID,
                message: "invalid date format pattern".into(),
            },
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn request_timeout_maps_to_timeout() {
        let err = session_error(
            "request failed",
            SessionError::Timeout(std::time::Duration::from_secs(5)),
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn handshake_failure_is_transport_error() {
        let err = session_error(
            "connect failed",
            SessionError::SetupRejected {
                code: ErrorCode::UNSUPPORTED_SETUP,
                message: "unsupported protocol version".into(),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
