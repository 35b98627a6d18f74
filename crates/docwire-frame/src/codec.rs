use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::header::{FrameHeader, HeaderLayout, HEADER_SIZE, MAX_LENGTH};

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Default time a frame may stay incomplete before it is reported as stuck.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(5);

/// One framed document payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Metadata documents carry protocol information, not application data.
    pub meta_data: bool,
    /// The encoded events.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(meta_data: bool, payload: impl Into<Bytes>) -> Self {
        Self {
            meta_data,
            payload: payload.into(),
        }
    }

    pub fn data(payload: impl Into<Bytes>) -> Self {
        Self::new(false, payload)
    }

    pub fn meta(payload: impl Into<Bytes>) -> Self {
        Self::new(true, payload)
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a complete frame.
///
/// ```text
/// ┌────────────────────────┬──────────────────┐
/// │ header word (4B LE)    │ payload          │
/// │ NC=0 | MD | length     │ (length bytes)   │
/// └────────────────────────┴──────────────────┘
/// ```
pub fn encode_frame(
    meta_data: bool,
    payload: &[u8],
    layout: HeaderLayout,
    dst: &mut BytesMut,
) -> Result<()> {
    let header = FrameHeader::complete(meta_data, payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le(header.encode(layout));
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. A header still
/// marked not-complete is left in place and reported as
/// [`FrameError::NotComplete`].
pub fn decode_frame(
    src: &mut BytesMut,
    max_payload: usize,
    layout: HeaderLayout,
) -> Result<Option<Frame>> {
    let Some(header) = peek_header(&src[..], layout) else {
        return Ok(None);
    };

    let (meta_data, len) = match header {
        FrameHeader::Complete { meta_data, len } => (meta_data, len as usize),
        FrameHeader::NotComplete { writer_id, .. } => {
            return Err(FrameError::NotComplete { writer_id });
        }
    };

    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(len).freeze();

    Ok(Some(Frame { meta_data, payload }))
}

/// Read the header at the front of `src` without consuming it.
pub fn peek_header(src: &[u8], layout: HeaderLayout) -> Option<FrameHeader> {
    let word: [u8; HEADER_SIZE] = src.get(..HEADER_SIZE)?.try_into().ok()?;
    Some(FrameHeader::decode(u32::from_le_bytes(word), layout))
}

/// Configuration for framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
    /// How long a frame may stay incomplete before the reader gives up.
    pub completion_timeout: Duration,
    /// Writer-id packing inside not-complete headers.
    pub layout: HeaderLayout,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            layout: HeaderLayout::default(),
        }
    }
}

impl FrameConfig {
    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max.min(MAX_LENGTH);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn with_layout(mut self, layout: HeaderLayout) -> Self {
        self.layout = layout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::NOT_COMPLETE;

    fn layout() -> HeaderLayout {
        HeaderLayout::default()
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, docwire!";

        encode_frame(true, payload, layout(), &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD, layout())
            .unwrap()
            .unwrap();

        assert!(frame.meta_data);
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x05, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD, layout()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(false, b"hello", layout(), &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD, layout()).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2, "partial frame must stay buffered");
    }

    #[test]
    fn test_decode_not_complete_header() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(NOT_COMPLETE | 0x2A);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD, layout());
        assert!(matches!(result, Err(FrameError::NotComplete { writer_id: 0x2A })));
        assert_eq!(buf.len(), HEADER_SIZE);
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(1024 * 1024 * 32);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD, layout());
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(true, b"first", layout(), &mut buf).unwrap();
        encode_frame(false, b"second", layout(), &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD, layout())
            .unwrap()
            .unwrap();
        assert!(f1.meta_data);
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD, layout())
            .unwrap()
            .unwrap();
        assert!(!f2.meta_data);
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(false, b"", layout(), &mut buf).unwrap();

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD, layout())
            .unwrap()
            .unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::data(Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
    }
}
