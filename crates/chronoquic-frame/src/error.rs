/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame body ended before a required field.
    #[error("truncated {frame_type} frame: needed {needed} more bytes")]
    Truncated {
        frame_type: &'static str,
        needed: usize,
    },

    /// The frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The 6-bit frame type is not assigned.
    #[error("unknown frame type 0x{0:02x}")]
    UnknownFrameType(u8),

    /// The FOLLOWS flag was set; fragment reassembly is not implemented.
    #[error("fragmented {0} frames are not supported")]
    FragmentationUnsupported(&'static str),

    /// A SETUP MIME type is not ASCII or is longer than 255 bytes.
    #[error("invalid MIME type: {0}")]
    InvalidMimeType(String),

    /// A numeric field does not fit its wire width.
    #[error("{field} out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: u128 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
