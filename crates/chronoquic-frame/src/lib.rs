//! RSocket frame model and length-prefixed codec.
//!
//! Every frame on the stream is:
//! - a 3-byte big-endian length prefix
//! - a 4-byte stream id (high bit reserved)
//! - a 2-byte word holding the 6-bit frame type and 10 flag bits
//! - a type-specific body
//!
//! Stream id 0 carries connection-level frames (SETUP, KEEPALIVE, connection
//! ERRORs); odd ids are client-initiated requests.

pub mod codec;
pub mod error;
pub mod kind;
pub mod payload;

pub use codec::{
    decode_frame, encode_frame, parse_frame, Frame, FrameCodec, FrameConfig, Setup, Version,
    DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE, LENGTH_PREFIX_SIZE, MAX_FRAME_LENGTH, MAX_STREAM_ID,
};
pub use error::{FrameError, Result};
pub use kind::{ErrorCode, FrameType};
pub use payload::Payload;
