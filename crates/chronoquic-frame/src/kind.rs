//! Frame types, header flags and error codes.
//!
//! Frame type occupies the top 6 bits of the 16-bit type/flags word, flags
//! the low 10 bits.

use std::fmt;

/// Frame may be ignored by a receiver that does not understand it.
pub const FLAG_IGNORE: u16 = 0x200;
/// Metadata is present.
pub const FLAG_METADATA: u16 = 0x100;
/// More fragments follow.
pub const FLAG_FOLLOWS: u16 = 0x80;
/// Stream completed (PAYLOAD, REQUEST_CHANNEL).
pub const FLAG_COMPLETE: u16 = 0x40;
/// PAYLOAD carries a next element.
pub const FLAG_NEXT: u16 = 0x20;
/// KEEPALIVE: receiver must respond.
pub const FLAG_RESPOND: u16 = 0x80;
/// SETUP: client requests resumption.
pub const FLAG_RESUME_ENABLE: u16 = 0x80;
/// SETUP: client honors LEASE.
pub const FLAG_LEASE: u16 = 0x40;

/// Mask for the 10 flag bits.
pub const FLAGS_MASK: u16 = 0x03FF;

/// Frame type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Setup = 0x01,
    Lease = 0x02,
    Keepalive = 0x03,
    RequestResponse = 0x04,
    RequestFnf = 0x05,
    RequestStream = 0x06,
    RequestChannel = 0x07,
    RequestN = 0x08,
    Cancel = 0x09,
    Payload = 0x0A,
    Error = 0x0B,
    MetadataPush = 0x0C,
    Resume = 0x0D,
    ResumeOk = 0x0E,
    Ext = 0x3F,
}

impl FrameType {
    /// Decode the 6-bit type code.
    pub fn from_code(code: u8) -> Option<Self> {
        let frame_type = match code {
            0x01 => Self::Setup,
            0x02 => Self::Lease,
            0x03 => Self::Keepalive,
            0x04 => Self::RequestResponse,
            0x05 => Self::RequestFnf,
            0x06 => Self::RequestStream,
            0x07 => Self::RequestChannel,
            0x08 => Self::RequestN,
            0x09 => Self::Cancel,
            0x0A => Self::Payload,
            0x0B => Self::Error,
            0x0C => Self::MetadataPush,
            0x0D => Self::Resume,
            0x0E => Self::ResumeOk,
            0x3F => Self::Ext,
            _ => return None,
        };
        Some(frame_type)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Lease => "LEASE",
            Self::Keepalive => "KEEPALIVE",
            Self::RequestResponse => "REQUEST_RESPONSE",
            Self::RequestFnf => "REQUEST_FNF",
            Self::RequestStream => "REQUEST_STREAM",
            Self::RequestChannel => "REQUEST_CHANNEL",
            Self::RequestN => "REQUEST_N",
            Self::Cancel => "CANCEL",
            Self::Payload => "PAYLOAD",
            Self::Error => "ERROR",
            Self::MetadataPush => "METADATA_PUSH",
            Self::Resume => "RESUME",
            Self::ResumeOk => "RESUME_OK",
            Self::Ext => "EXT",
        }
    }

    /// Returns true for frame types that start a new request stream.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Self::RequestResponse | Self::RequestFnf | Self::RequestStream | Self::RequestChannel
        )
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// ERROR frame code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    pub const INVALID_SETUP: Self = Self(0x0000_0001);
    pub const UNSUPPORTED_SETUP: Self = Self(0x0000_0002);
    pub const REJECTED_SETUP: Self = Self(0x0000_0003);
    pub const REJECTED_RESUME: Self = Self(0x0000_0004);
    pub const CONNECTION_ERROR: Self = Self(0x0000_0101);
    pub const CONNECTION_CLOSE: Self = Self(0x0000_0102);
    pub const APPLICATION_ERROR: Self = Self(0x0000_0201);
    pub const REJECTED: Self = Self(0x0000_0202);
    pub const CANCELED: Self = Self(0x0000_0203);
    pub const INVALID: Self = Self(0x0000_0204);

    pub fn name(self) -> &'static str {
        match self {
            Self::INVALID_SETUP => "INVALID_SETUP",
            Self::UNSUPPORTED_SETUP => "UNSUPPORTED_SETUP",
            Self::REJECTED_SETUP => "REJECTED_SETUP",
            Self::REJECTED_RESUME => "REJECTED_RESUME",
            Self::CONNECTION_ERROR => "CONNECTION_ERROR",
            Self::CONNECTION_CLOSE => "CONNECTION_CLOSE",
            Self::APPLICATION_ERROR => "APPLICATION_ERROR",
            Self::REJECTED => "REJECTED",
            Self::CANCELED => "CANCELED",
            Self::INVALID => "INVALID",
            _ => "CUSTOM",
        }
    }

    /// Codes that may only appear on stream 0.
    pub fn is_connection_level(self) -> bool {
        matches!(
            self,
            Self::INVALID_SETUP
                | Self::UNSUPPORTED_SETUP
                | Self::REJECTED_SETUP
                | Self::REJECTED_RESUME
                | Self::CONNECTION_ERROR
                | Self::CONNECTION_CLOSE
        )
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:08x})", self.name(), self.0)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
