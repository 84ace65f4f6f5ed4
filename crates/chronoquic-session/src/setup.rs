use std::fmt;
use std::time::Duration;

use chronoquic_frame::{ErrorCode, Frame, Payload, Setup, Version};

use crate::error::SessionError;

/// Default interval between client KEEPALIVE frames.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);
/// Default time without frames after which a session is considered dead.
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(90);
/// Default metadata MIME type announced in SETUP.
pub const DEFAULT_METADATA_MIME_TYPE: &str = "application/octet-stream";
/// Default data MIME type announced in SETUP.
pub const DEFAULT_DATA_MIME_TYPE: &str = "text/plain";

const MAX_MIME_LEN: usize = 255;

/// What a requester announces in its SETUP frame.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    pub keepalive_interval: Duration,
    pub max_lifetime: Duration,
    pub metadata_mime_type: String,
    pub data_mime_type: String,
    /// Optional SETUP payload.
    pub payload: Payload,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            max_lifetime: DEFAULT_MAX_LIFETIME,
            metadata_mime_type: DEFAULT_METADATA_MIME_TYPE.to_string(),
            data_mime_type: DEFAULT_DATA_MIME_TYPE.to_string(),
            payload: Payload::empty(),
        }
    }
}

impl SetupConfig {
    /// Build the SETUP frame for this configuration.
    pub fn to_frame(&self) -> Frame {
        Frame::Setup(Setup {
            version: Version::V1,
            keepalive_interval: self.keepalive_interval,
            max_lifetime: self.max_lifetime,
            resume_token: None,
            lease: false,
            metadata_mime_type: self.metadata_mime_type.clone(),
            data_mime_type: self.data_mime_type.clone(),
            payload: self.payload.clone(),
        })
    }
}

/// Parameters accepted from a peer's SETUP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupInfo {
    pub version: Version,
    pub keepalive_interval: Duration,
    pub max_lifetime: Duration,
    pub metadata_mime_type: String,
    pub data_mime_type: String,
}

/// Why a SETUP frame was refused. Sent back as ERROR on stream 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRejection {
    pub code: ErrorCode,
    pub message: String,
}

impl SetupRejection {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::INVALID_SETUP,
            message: message.into(),
        }
    }

    fn unsupported(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::UNSUPPORTED_SETUP,
            message: message.into(),
        }
    }

    /// ERROR frame announcing the rejection.
    pub fn to_frame(&self) -> Frame {
        Frame::error(0, self.code, self.message.clone())
    }
}

impl fmt::Display for SetupRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<SetupRejection> for SessionError {
    fn from(rejection: SetupRejection) -> Self {
        SessionError::SetupRejected {
            code: rejection.code,
            message: rejection.message,
        }
    }
}

/// Check a SETUP frame against what this responder supports.
pub fn validate_setup(setup: &Setup) -> std::result::Result<SetupInfo, SetupRejection> {
    if setup.version.major != Version::V1.major {
        return Err(SetupRejection::unsupported(format!(
            "unsupported protocol version {} (server {})",
            setup.version,
            Version::V1
        )));
    }
    if setup.resume_token.is_some() {
        return Err(SetupRejection::unsupported("resumption is not supported"));
    }
    if setup.lease {
        return Err(SetupRejection::unsupported("leasing is not supported"));
    }
    if setup.keepalive_interval.is_zero() {
        return Err(SetupRejection::invalid("keepalive interval must be non-zero"));
    }
    if setup.max_lifetime.is_zero() {
        return Err(SetupRejection::invalid("max lifetime must be non-zero"));
    }
    validate_mime("metadata", &setup.metadata_mime_type)?;
    validate_mime("data", &setup.data_mime_type)?;

    Ok(SetupInfo {
        version: setup.version,
        keepalive_interval: setup.keepalive_interval,
        max_lifetime: setup.max_lifetime,
        metadata_mime_type: setup.metadata_mime_type.clone(),
        data_mime_type: setup.data_mime_type.clone(),
    })
}

fn validate_mime(kind: &str, mime: &str) -> std::result::Result<(), SetupRejection> {
    if mime.is_empty() {
        return Err(SetupRejection::invalid(format!(
            "{kind} MIME type must not be empty"
        )));
    }
    if mime.len() > MAX_MIME_LEN || !mime.is_ascii() {
        return Err(SetupRejection::invalid(format!(
            "{kind} MIME type must be ASCII and at most {MAX_MIME_LEN} bytes"
        )));
    }
    Ok(())
}
