use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};
use crate::kind::{
    ErrorCode, FrameType, FLAGS_MASK, FLAG_COMPLETE, FLAG_FOLLOWS, FLAG_IGNORE, FLAG_LEASE,
    FLAG_METADATA, FLAG_NEXT, FLAG_RESPOND, FLAG_RESUME_ENABLE,
};
use crate::payload::Payload;

/// Length prefix size: 24-bit big-endian.
pub const LENGTH_PREFIX_SIZE: usize = 3;

/// Frame header after the length prefix: stream id (4) + type/flags (2).
pub const HEADER_SIZE: usize = 6;
/// Frame header plus the 32-bit error code of an ERROR frame.
const ERROR_HEADER_SIZE: usize = HEADER_SIZE + 4;

/// Largest frame a 24-bit length prefix can describe.
pub const MAX_FRAME_LENGTH: usize = 0x00FF_FFFF;

/// Default maximum frame size.
pub const DEFAULT_MAX_FRAME_SIZE: usize = MAX_FRAME_LENGTH;

/// Largest stream id (31 bits).
pub const MAX_STREAM_ID: u32 = 0x7FFF_FFFF;

const MAX_MIME_LEN: usize = u8::MAX as usize;
const MAX_METADATA_LEN: usize = 0x00FF_FFFF;

/// Protocol version carried in SETUP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    /// Version 1.0.
    pub const V1: Version = Version { major: 1, minor: 0 };
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// SETUP frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setup {
    pub version: Version,
    /// Interval at which the client sends KEEPALIVE.
    pub keepalive_interval: Duration,
    /// Time without any frame after which the peer is considered dead.
    pub max_lifetime: Duration,
    pub resume_token: Option<Bytes>,
    pub lease: bool,
    pub metadata_mime_type: String,
    pub data_mime_type: String,
    pub payload: Payload,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Setup(Setup),
    Lease {
        ttl: Duration,
        number_of_requests: u32,
        metadata: Option<Bytes>,
    },
    Keepalive {
        respond: bool,
        last_received_position: u64,
        data: Bytes,
    },
    RequestResponse {
        stream_id: u32,
        payload: Payload,
    },
    RequestFnf {
        stream_id: u32,
        payload: Payload,
    },
    RequestStream {
        stream_id: u32,
        initial_request_n: u32,
        payload: Payload,
    },
    RequestChannel {
        stream_id: u32,
        initial_request_n: u32,
        complete: bool,
        payload: Payload,
    },
    RequestN {
        stream_id: u32,
        n: u32,
    },
    Cancel {
        stream_id: u32,
    },
    Payload {
        stream_id: u32,
        payload: Payload,
        next: bool,
        complete: bool,
    },
    Error {
        stream_id: u32,
        code: ErrorCode,
        message: String,
    },
    MetadataPush {
        metadata: Bytes,
    },
    /// A frame type this implementation recognizes but does not act on
    /// (RESUME, RESUME_OK, EXT). The body is discarded.
    Unsupported {
        stream_id: u32,
        frame_type: FrameType,
        ignorable: bool,
    },
}

impl Frame {
    /// ERROR frame.
    pub fn error(stream_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Frame::Error {
            stream_id,
            code,
            message: message.into(),
        }
    }

    /// Shorten an ERROR frame's message, on a char boundary, so the frame
    /// encodes within `max_frame_size`. Returns true if anything was cut.
    /// Other frames are left alone.
    pub fn truncate_error_message(&mut self, max_frame_size: usize) -> bool {
        let Frame::Error { message, .. } = self else {
            return false;
        };
        let budget = max_frame_size
            .min(MAX_FRAME_LENGTH)
            .saturating_sub(ERROR_HEADER_SIZE);
        if message.len() <= budget {
            return false;
        }
        let mut end = budget;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
        true
    }

    /// PAYLOAD frame carrying one value and completing the stream.
    pub fn complete_with(stream_id: u32, payload: Payload) -> Self {
        Frame::Payload {
            stream_id,
            payload,
            next: true,
            complete: true,
        }
    }

    /// Stream this frame belongs to; `0` for connection-level frames.
    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Setup(_)
            | Frame::Lease { .. }
            | Frame::Keepalive { .. }
            | Frame::MetadataPush { .. } => 0,
            Frame::RequestResponse { stream_id, .. }
            | Frame::RequestFnf { stream_id, .. }
            | Frame::RequestStream { stream_id, .. }
            | Frame::RequestChannel { stream_id, .. }
            | Frame::RequestN { stream_id, .. }
            | Frame::Cancel { stream_id }
            | Frame::Payload { stream_id, .. }
            | Frame::Error { stream_id, .. }
            | Frame::Unsupported { stream_id, .. } => *stream_id,
        }
    }

    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Setup(_) => FrameType::Setup,
            Frame::Lease { .. } => FrameType::Lease,
            Frame::Keepalive { .. } => FrameType::Keepalive,
            Frame::RequestResponse { .. } => FrameType::RequestResponse,
            Frame::RequestFnf { .. } => FrameType::RequestFnf,
            Frame::RequestStream { .. } => FrameType::RequestStream,
            Frame::RequestChannel { .. } => FrameType::RequestChannel,
            Frame::RequestN { .. } => FrameType::RequestN,
            Frame::Cancel { .. } => FrameType::Cancel,
            Frame::Payload { .. } => FrameType::Payload,
            Frame::Error { .. } => FrameType::Error,
            Frame::MetadataPush { .. } => FrameType::MetadataPush,
            Frame::Unsupported { frame_type, .. } => *frame_type,
        }
    }
}

/// Encode a frame, length prefix included.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────────┬──────────────┐
/// │ Length       │ Stream ID    │ Type(6) | Flags(10)  │ Body         │
/// │ (3B BE)      │ (4B BE)      │ (2B BE)              │              │
/// └──────────────┴──────────────┴──────────────────────┴──────────────┘
/// ```
///
/// `dst` is left untouched on error.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut, max_frame_size: usize) -> Result<()> {
    let start = dst.len();
    dst.put_bytes(0, LENGTH_PREFIX_SIZE);

    if let Err(err) = encode_body(frame, dst) {
        dst.truncate(start);
        return Err(err);
    }

    let len = dst.len() - start - LENGTH_PREFIX_SIZE;
    let max = max_frame_size.min(MAX_FRAME_LENGTH);
    if len > max {
        dst.truncate(start);
        return Err(FrameError::PayloadTooLarge { size: len, max });
    }

    let prefix = (len as u32).to_be_bytes();
    dst[start..start + LENGTH_PREFIX_SIZE].copy_from_slice(&prefix[1..]);
    Ok(())
}

fn encode_body(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    match frame {
        Frame::Setup(setup) => {
            let mut flags = metadata_flag(&setup.payload);
            if setup.resume_token.is_some() {
                flags |= FLAG_RESUME_ENABLE;
            }
            if setup.lease {
                flags |= FLAG_LEASE;
            }
            put_header(dst, 0, FrameType::Setup, flags);
            dst.put_u16(setup.version.major);
            dst.put_u16(setup.version.minor);
            dst.put_u32(millis_u31("keepalive_interval", setup.keepalive_interval)?);
            dst.put_u32(millis_u31("max_lifetime", setup.max_lifetime)?);
            if let Some(token) = &setup.resume_token {
                let len = u16::try_from(token.len()).map_err(|_| FrameError::FieldOutOfRange {
                    field: "resume_token length",
                    value: token.len() as u128,
                })?;
                dst.put_u16(len);
                dst.put_slice(token);
            }
            put_mime(dst, &setup.metadata_mime_type)?;
            put_mime(dst, &setup.data_mime_type)?;
            put_payload(dst, &setup.payload)?;
        }
        Frame::Lease {
            ttl,
            number_of_requests,
            metadata,
        } => {
            let flags = if metadata.is_some() { FLAG_METADATA } else { 0 };
            put_header(dst, 0, FrameType::Lease, flags);
            dst.put_u32(millis_u31("lease ttl", *ttl)?);
            dst.put_u32(*number_of_requests & 0x7FFF_FFFF);
            if let Some(metadata) = metadata {
                dst.put_slice(metadata);
            }
        }
        Frame::Keepalive {
            respond,
            last_received_position,
            data,
        } => {
            let flags = if *respond { FLAG_RESPOND } else { 0 };
            put_header(dst, 0, FrameType::Keepalive, flags);
            dst.put_u64(*last_received_position & 0x7FFF_FFFF_FFFF_FFFF);
            dst.put_slice(data);
        }
        Frame::RequestResponse { stream_id, payload } => {
            put_header(
                dst,
                *stream_id,
                FrameType::RequestResponse,
                metadata_flag(payload),
            );
            put_payload(dst, payload)?;
        }
        Frame::RequestFnf { stream_id, payload } => {
            put_header(dst, *stream_id, FrameType::RequestFnf, metadata_flag(payload));
            put_payload(dst, payload)?;
        }
        Frame::RequestStream {
            stream_id,
            initial_request_n,
            payload,
        } => {
            put_header(
                dst,
                *stream_id,
                FrameType::RequestStream,
                metadata_flag(payload),
            );
            dst.put_u32(*initial_request_n & 0x7FFF_FFFF);
            put_payload(dst, payload)?;
        }
        Frame::RequestChannel {
            stream_id,
            initial_request_n,
            complete,
            payload,
        } => {
            let mut flags = metadata_flag(payload);
            if *complete {
                flags |= FLAG_COMPLETE;
            }
            put_header(dst, *stream_id, FrameType::RequestChannel, flags);
            dst.put_u32(*initial_request_n & 0x7FFF_FFFF);
            put_payload(dst, payload)?;
        }
        Frame::RequestN { stream_id, n } => {
            put_header(dst, *stream_id, FrameType::RequestN, 0);
            dst.put_u32(*n & 0x7FFF_FFFF);
        }
        Frame::Cancel { stream_id } => {
            put_header(dst, *stream_id, FrameType::Cancel, 0);
        }
        Frame::Payload {
            stream_id,
            payload,
            next,
            complete,
        } => {
            let mut flags = metadata_flag(payload);
            if *next {
                flags |= FLAG_NEXT;
            }
            if *complete {
                flags |= FLAG_COMPLETE;
            }
            put_header(dst, *stream_id, FrameType::Payload, flags);
            put_payload(dst, payload)?;
        }
        Frame::Error {
            stream_id,
            code,
            message,
        } => {
            put_header(dst, *stream_id, FrameType::Error, 0);
            dst.put_u32(code.0);
            dst.put_slice(message.as_bytes());
        }
        Frame::MetadataPush { metadata } => {
            put_header(dst, 0, FrameType::MetadataPush, FLAG_METADATA);
            dst.put_slice(metadata);
        }
        Frame::Unsupported {
            stream_id,
            frame_type,
            ignorable,
        } => {
            let flags = if *ignorable { FLAG_IGNORE } else { 0 };
            put_header(dst, *stream_id, *frame_type, flags);
        }
    }
    Ok(())
}

fn put_header(dst: &mut BytesMut, stream_id: u32, frame_type: FrameType, flags: u16) {
    dst.put_u32(stream_id & 0x7FFF_FFFF);
    dst.put_u16(((frame_type.code() as u16) << 10) | (flags & FLAGS_MASK));
}

fn metadata_flag(payload: &Payload) -> u16 {
    if payload.has_metadata() {
        FLAG_METADATA
    } else {
        0
    }
}

fn put_payload(dst: &mut BytesMut, payload: &Payload) -> Result<()> {
    if let Some(metadata) = payload.metadata() {
        if metadata.len() > MAX_METADATA_LEN {
            return Err(FrameError::PayloadTooLarge {
                size: metadata.len(),
                max: MAX_METADATA_LEN,
            });
        }
        put_u24(dst, metadata.len() as u32);
        dst.put_slice(metadata);
    }
    dst.put_slice(payload.data());
    Ok(())
}

fn put_mime(dst: &mut BytesMut, mime: &str) -> Result<()> {
    if !mime.is_ascii() || mime.len() > MAX_MIME_LEN {
        return Err(FrameError::InvalidMimeType(mime.to_string()));
    }
    dst.put_u8(mime.len() as u8);
    dst.put_slice(mime.as_bytes());
    Ok(())
}

fn put_u24(dst: &mut BytesMut, value: u32) {
    dst.put_slice(&value.to_be_bytes()[1..]);
}

fn millis_u31(field: &'static str, value: Duration) -> Result<u32> {
    let millis = value.as_millis();
    if millis > 0x7FFF_FFFF {
        return Err(FrameError::FieldOutOfRange {
            field,
            value: millis,
        });
    }
    Ok(millis as u32)
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Frame>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None); // Need more data
    }

    let frame_len = ((src[0] as usize) << 16) | ((src[1] as usize) << 8) | (src[2] as usize);
    if frame_len > max_frame_size {
        return Err(FrameError::PayloadTooLarge {
            size: frame_len,
            max: max_frame_size,
        });
    }

    let total = LENGTH_PREFIX_SIZE + frame_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None); // Need more data
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let body = src.split_to(frame_len).freeze();
    parse_frame(body).map(Some)
}

/// Parse a frame body (everything after the length prefix).
pub fn parse_frame(mut body: Bytes) -> Result<Frame> {
    ensure(&body, HEADER_SIZE, "frame header")?;
    let stream_id = body.get_u32() & 0x7FFF_FFFF;
    let type_and_flags = body.get_u16();
    let code = (type_and_flags >> 10) as u8;
    let flags = type_and_flags & FLAGS_MASK;

    let frame_type = FrameType::from_code(code).ok_or(FrameError::UnknownFrameType(code))?;
    let name = frame_type.name();

    if flags & FLAG_FOLLOWS != 0
        && matches!(
            frame_type,
            FrameType::RequestResponse
                | FrameType::RequestFnf
                | FrameType::RequestStream
                | FrameType::RequestChannel
                | FrameType::Payload
        )
    {
        return Err(FrameError::FragmentationUnsupported(name));
    }

    let frame = match frame_type {
        FrameType::Setup => {
            ensure(&body, 12, name)?;
            let version = Version {
                major: body.get_u16(),
                minor: body.get_u16(),
            };
            let keepalive_interval = Duration::from_millis(u64::from(body.get_u32() & 0x7FFF_FFFF));
            let max_lifetime = Duration::from_millis(u64::from(body.get_u32() & 0x7FFF_FFFF));
            let resume_token = if flags & FLAG_RESUME_ENABLE != 0 {
                ensure(&body, 2, name)?;
                let len = body.get_u16() as usize;
                Some(take(&mut body, len, name)?)
            } else {
                None
            };
            let metadata_mime_type = take_mime(&mut body, name)?;
            let data_mime_type = take_mime(&mut body, name)?;
            let payload = take_payload(body, flags, name)?;
            Frame::Setup(Setup {
                version,
                keepalive_interval,
                max_lifetime,
                resume_token,
                lease: flags & FLAG_LEASE != 0,
                metadata_mime_type,
                data_mime_type,
                payload,
            })
        }
        FrameType::Lease => {
            ensure(&body, 8, name)?;
            let ttl = Duration::from_millis(u64::from(body.get_u32() & 0x7FFF_FFFF));
            let number_of_requests = body.get_u32() & 0x7FFF_FFFF;
            let metadata = (flags & FLAG_METADATA != 0).then_some(body);
            Frame::Lease {
                ttl,
                number_of_requests,
                metadata,
            }
        }
        FrameType::Keepalive => {
            ensure(&body, 8, name)?;
            let last_received_position = body.get_u64() & 0x7FFF_FFFF_FFFF_FFFF;
            Frame::Keepalive {
                respond: flags & FLAG_RESPOND != 0,
                last_received_position,
                data: body,
            }
        }
        FrameType::RequestResponse => Frame::RequestResponse {
            stream_id,
            payload: take_payload(body, flags, name)?,
        },
        FrameType::RequestFnf => Frame::RequestFnf {
            stream_id,
            payload: take_payload(body, flags, name)?,
        },
        FrameType::RequestStream => {
            ensure(&body, 4, name)?;
            let initial_request_n = body.get_u32() & 0x7FFF_FFFF;
            Frame::RequestStream {
                stream_id,
                initial_request_n,
                payload: take_payload(body, flags, name)?,
            }
        }
        FrameType::RequestChannel => {
            ensure(&body, 4, name)?;
            let initial_request_n = body.get_u32() & 0x7FFF_FFFF;
            Frame::RequestChannel {
                stream_id,
                initial_request_n,
                complete: flags & FLAG_COMPLETE != 0,
                payload: take_payload(body, flags, name)?,
            }
        }
        FrameType::RequestN => {
            ensure(&body, 4, name)?;
            Frame::RequestN {
                stream_id,
                n: body.get_u32() & 0x7FFF_FFFF,
            }
        }
        FrameType::Cancel => Frame::Cancel { stream_id },
        FrameType::Payload => Frame::Payload {
            stream_id,
            next: flags & FLAG_NEXT != 0,
            complete: flags & FLAG_COMPLETE != 0,
            payload: take_payload(body, flags, name)?,
        },
        FrameType::Error => {
            ensure(&body, 4, name)?;
            let code = ErrorCode(body.get_u32());
            Frame::Error {
                stream_id,
                code,
                message: String::from_utf8_lossy(&body).into_owned(),
            }
        }
        FrameType::MetadataPush => Frame::MetadataPush { metadata: body },
        FrameType::Resume | FrameType::ResumeOk | FrameType::Ext => Frame::Unsupported {
            stream_id,
            frame_type,
            ignorable: flags & FLAG_IGNORE != 0,
        },
    };

    Ok(frame)
}

fn ensure(body: &Bytes, needed: usize, frame_type: &'static str) -> Result<()> {
    if body.len() < needed {
        return Err(FrameError::Truncated {
            frame_type,
            needed: needed - body.len(),
        });
    }
    Ok(())
}

fn take(body: &mut Bytes, len: usize, frame_type: &'static str) -> Result<Bytes> {
    ensure(body, len, frame_type)?;
    Ok(body.split_to(len))
}

fn take_mime(body: &mut Bytes, frame_type: &'static str) -> Result<String> {
    ensure(body, 1, frame_type)?;
    let len = body.get_u8() as usize;
    let raw = take(body, len, frame_type)?;
    if !raw.is_ascii() {
        return Err(FrameError::InvalidMimeType(
            String::from_utf8_lossy(&raw).into_owned(),
        ));
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn take_payload(mut body: Bytes, flags: u16, frame_type: &'static str) -> Result<Payload> {
    if flags & FLAG_METADATA == 0 {
        return Ok(Payload::new(body));
    }
    ensure(&body, 3, frame_type)?;
    let len = ((body.get_u8() as usize) << 16) | (body.get_u16() as usize);
    let metadata = take(&mut body, len, frame_type)?;
    Ok(Payload::with_metadata(body, metadata))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame size in bytes, excluding the length prefix. Default: 16 MiB - 1.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// `tokio_util` codec for length-prefixed frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    config: FrameConfig,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.config.max_frame_size)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&item, dst, self.config.max_frame_size)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    fn roundtrip(frame: Frame) -> Frame {
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap();
        let decoded = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert!(buf.is_empty());
        decoded
    }

    fn sample_setup() -> Setup {
        Setup {
            version: Version::V1,
            keepalive_interval: Duration::from_secs(20),
            max_lifetime: Duration::from_secs(90),
            resume_token: None,
            lease: false,
            metadata_mime_type: "application/octet-stream".to_string(),
            data_mime_type: "text/plain".to_string(),
            payload: Payload::empty(),
        }
    }

    #[test]
    fn request_response_wire_layout() {
        let mut buf = BytesMut::new();
        let frame = Frame::RequestResponse {
            stream_id: 1,
            payload: Payload::from("%Y"),
        };
        encode_frame(&frame, &mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[
                0x00, 0x00, 0x08, // length = 6 header + 2 data
                0x00, 0x00, 0x00, 0x01, // stream id
                0x10, 0x00, // REQUEST_RESPONSE << 10, no flags
                b'%', b'Y',
            ]
        );
    }

    #[test]
    fn setup_with_metadata_and_resume_token() {
        let mut setup = sample_setup();
        setup.resume_token = Some(Bytes::from_static(b"token"));
        setup.payload = Payload::with_metadata("hello", Bytes::from_static(b"meta"));
        let decoded = roundtrip(Frame::Setup(setup.clone()));
        assert_eq!(decoded, Frame::Setup(setup));
    }

    #[test]
    fn payload_flags_survive() {
        let decoded = roundtrip(Frame::Payload {
            stream_id: 7,
            payload: Payload::from("2024-01-01"),
            next: true,
            complete: true,
        });
        match decoded {
            Frame::Payload {
                stream_id,
                payload,
                next,
                complete,
            } => {
                assert_eq!(stream_id, 7);
                assert_eq!(payload.data().as_ref(), b"2024-01-01");
                assert!(next && complete);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn error_frame_carries_code_and_message() {
        let decoded = roundtrip(Frame::error(3, ErrorCode::INVALID, "bad pattern"));
        assert_eq!(decoded.stream_id(), 3);
        assert_eq!(decoded, Frame::error(3, ErrorCode::INVALID, "bad pattern"));
    }

    #[test]
    fn keepalive_respond_flag() {
        let decoded = roundtrip(Frame::Keepalive {
            respond: true,
            last_received_position: 42,
            data: Bytes::from_static(b"ping"),
        });
        assert_eq!(decoded.frame_type(), FrameType::Keepalive);
        assert!(matches!(decoded, Frame::Keepalive { respond: true, last_received_position: 42, .. }));
    }

    #[test]
    fn decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .is_none());
    }

    #[test]
    fn decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::Cancel { stream_id: 5 }, &mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .is_none());
    }

    #[test]
    fn decode_rejects_oversized_length() {
        let mut buf = BytesMut::from(&[0x00, 0x10, 0x00][..]);
        let result = decode_frame(&mut buf, 1024);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { size: 4096, max: 1024 })));
    }

    #[test]
    fn encode_rejects_oversized_frame_and_leaves_buffer() {
        let mut buf = BytesMut::from(&b"keep"[..]);
        let frame = Frame::RequestResponse {
            stream_id: 1,
            payload: Payload::new(vec![0u8; 64]),
        };
        let result = encode_frame(&frame, &mut buf, 32);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
        assert_eq!(buf.as_ref(), b"keep");
    }

    #[test]
    fn decode_unknown_frame_type() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0x00, 0x00, 0x06]);
        buf.put_u32(1);
        buf.put_u16(0x20 << 10);
        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(result, Err(FrameError::UnknownFrameType(0x20))));
    }

    #[test]
    fn decode_rejects_fragments() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0x00, 0x00, 0x06]);
        buf.put_u32(1);
        buf.put_u16(((FrameType::RequestResponse.code() as u16) << 10) | FLAG_FOLLOWS);
        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(
            result,
            Err(FrameError::FragmentationUnsupported("REQUEST_RESPONSE"))
        ));
    }

    #[test]
    fn decode_truncated_metadata_length() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0x00, 0x00, 0x08]);
        buf.put_u32(1);
        buf.put_u16(((FrameType::RequestResponse.code() as u16) << 10) | FLAG_METADATA);
        buf.put_slice(&[0x00, 0x00]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(result, Err(FrameError::Truncated { .. })));
    }

    #[test]
    fn resume_decodes_as_unsupported() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0x00, 0x00, 0x06]);
        buf.put_u32(0);
        buf.put_u16(((FrameType::Resume.code() as u16) << 10) | FLAG_IGNORE);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(
            frame,
            Frame::Unsupported {
                stream_id: 0,
                frame_type: FrameType::Resume,
                ignorable: true
            }
        );
    }

    #[test]
    fn setup_rejects_non_ascii_mime() {
        let mut setup = sample_setup();
        setup.data_mime_type = "text/plaïn".to_string();
        let mut buf = BytesMut::new();
        let result = encode_frame(&Frame::Setup(setup), &mut buf, DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(result, Err(FrameError::InvalidMimeType(_))));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn codec_over_duplex_stream() {
        let (client, server) = tokio::io::duplex(64);
        let mut writer = FramedWrite::new(client, FrameCodec::new());
        let mut reader = FramedRead::new(server, FrameCodec::new());

        let sent = vec![
            Frame::Setup(sample_setup()),
            Frame::RequestResponse {
                stream_id: 1,
                payload: Payload::new(vec![0xAB; 300]),
            },
            Frame::Cancel { stream_id: 1 },
        ];

        let expected = sent.clone();
        let send = tokio::spawn(async move {
            for frame in sent {
                writer.send(frame).await.unwrap();
            }
        });

        for frame in expected {
            let received = reader.next().await.unwrap().unwrap();
            assert_eq!(received, frame);
        }
        send.await.unwrap();
    }

    #[test]
    fn long_error_message_is_cut_to_fit() {
        let mut frame = Frame::error(7, ErrorCode::INVALID, "é".repeat(40));
        assert!(frame.truncate_error_message(32));

        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf, 32).expect("truncated ERROR should encode");
        match decode_frame(&mut buf, 32)
            .expect("frame should decode")
            .expect("frame should be complete")
        {
            Frame::Error {
                stream_id, message, ..
            } => {
                assert_eq!(stream_id, 7);
                // 22 bytes of budget; never split a two-byte char.
                assert_eq!(message, "é".repeat(11));
            }
            other => panic!("expected ERROR, got {other:?}"),
        }
    }

    #[test]
    fn short_error_message_and_other_frames_are_untouched() {
        let mut frame = Frame::error(1, ErrorCode::INVALID, "bad pattern");
        assert!(!frame.truncate_error_message(DEFAULT_MAX_FRAME_SIZE));
        assert_eq!(frame, Frame::error(1, ErrorCode::INVALID, "bad pattern"));

        let mut payload = Frame::complete_with(1, Payload::new(vec![0u8; 128]));
        assert!(!payload.truncate_error_message(16));
    }
}
