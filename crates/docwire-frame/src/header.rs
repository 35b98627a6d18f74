//! The 32-bit frame header word.
//!
//! ```text
//!  31   30   29 ........................................ 0
//! ┌────┬────┬──────────────────────────────────────────────┐
//! │ NC │ MD │ payload length (complete)                     │
//! │    │    │ masked writer id (not complete)               │
//! └────┴────┴──────────────────────────────────────────────┘
//! ```
//!
//! The word is stored little-endian ahead of every payload. How many low
//! bits carry the writer id while a frame is open is a [`HeaderLayout`]
//! setting; both ends of a stream must agree on it.

use crate::error::{FrameError, Result};

/// Header word size in bytes.
pub const HEADER_SIZE: usize = 4;

/// Set while the frame's payload has not been committed.
pub const NOT_COMPLETE: u32 = 0x8000_0000;

/// Set for metadata documents.
pub const META_DATA: u32 = 0x4000_0000;

/// Bits available for length or writer id.
pub const LENGTH_MASK: u32 = 0x3FFF_FFFF;

/// Largest payload a header can describe.
pub const MAX_LENGTH: usize = LENGTH_MASK as usize;

/// Default writer-id width.
pub const DEFAULT_WRITER_ID_BITS: u8 = 16;

/// Bit packing of the writer id inside a not-complete header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    writer_id_bits: u8,
}

impl HeaderLayout {
    /// Build a layout carrying `writer_id_bits` bits of writer id (1..=30).
    pub fn new(writer_id_bits: u8) -> Result<Self> {
        if writer_id_bits == 0 || u32::from(writer_id_bits) > LENGTH_MASK.count_ones() {
            return Err(FrameError::InvalidLayout(format!(
                "writer id bits must be 1..=30, got {writer_id_bits}"
            )));
        }
        Ok(Self { writer_id_bits })
    }

    pub fn writer_id_bits(&self) -> u8 {
        self.writer_id_bits
    }

    pub fn writer_id_mask(&self) -> u32 {
        LENGTH_MASK >> (LENGTH_MASK.count_ones() - u32::from(self.writer_id_bits))
    }

    pub fn mask_writer_id(&self, writer_id: u32) -> u32 {
        writer_id & self.writer_id_mask()
    }
}

impl Default for HeaderLayout {
    fn default() -> Self {
        Self {
            writer_id_bits: DEFAULT_WRITER_ID_BITS,
        }
    }
}

/// Decoded header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeader {
    /// Payload committed; `len` bytes follow.
    Complete { meta_data: bool, len: u32 },
    /// Header reserved by a writer that has not finished.
    NotComplete { meta_data: bool, writer_id: u32 },
}

impl FrameHeader {
    /// Header for a committed payload of `len` bytes.
    pub fn complete(meta_data: bool, len: usize) -> Result<Self> {
        if len > MAX_LENGTH {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: MAX_LENGTH,
            });
        }
        Ok(Self::Complete {
            meta_data,
            len: len as u32,
        })
    }

    pub fn encode(self, layout: HeaderLayout) -> u32 {
        match self {
            Self::Complete { meta_data, len } => meta_bit(meta_data) | (len & LENGTH_MASK),
            Self::NotComplete {
                meta_data,
                writer_id,
            } => NOT_COMPLETE | meta_bit(meta_data) | layout.mask_writer_id(writer_id),
        }
    }

    pub fn decode(word: u32, layout: HeaderLayout) -> Self {
        let meta_data = word & META_DATA != 0;
        if word & NOT_COMPLETE != 0 {
            Self::NotComplete {
                meta_data,
                writer_id: layout.mask_writer_id(word),
            }
        } else {
            Self::Complete {
                meta_data,
                len: word & LENGTH_MASK,
            }
        }
    }

    pub fn is_meta_data(&self) -> bool {
        match self {
            Self::Complete { meta_data, .. } | Self::NotComplete { meta_data, .. } => *meta_data,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

fn meta_bit(meta_data: bool) -> u32 {
    if meta_data {
        META_DATA
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn any_header_survives_encoding(
            meta_data in any::<bool>(),
            value in 0u32..=LENGTH_MASK,
            bits in 1u8..=30,
            complete in any::<bool>(),
        ) {
            let layout = HeaderLayout::new(bits).unwrap();
            let header = if complete {
                FrameHeader::Complete { meta_data, len: value }
            } else {
                FrameHeader::NotComplete { meta_data, writer_id: layout.mask_writer_id(value) }
            };
            let decoded = FrameHeader::decode(header.encode(layout), layout);
            prop_assert_eq!(decoded, header);
            prop_assert_eq!(decoded.is_complete(), complete);
            prop_assert_eq!(decoded.is_meta_data(), meta_data);
        }
    }

    #[test]
    fn complete_header_roundtrip() {
        let layout = HeaderLayout::default();
        for (meta_data, len) in [(false, 0u32), (true, 17), (false, LENGTH_MASK)] {
            let header = FrameHeader::Complete { meta_data, len };
            assert_eq!(FrameHeader::decode(header.encode(layout), layout), header);
        }
    }

    #[test]
    fn not_complete_masks_writer_id() {
        let layout = HeaderLayout::new(8).unwrap();
        let word = FrameHeader::NotComplete {
            meta_data: true,
            writer_id: 0x1234,
        }
        .encode(layout);

        assert_eq!(word & NOT_COMPLETE, NOT_COMPLETE);
        assert_eq!(word & META_DATA, META_DATA);
        assert_eq!(
            FrameHeader::decode(word, layout),
            FrameHeader::NotComplete {
                meta_data: true,
                writer_id: 0x34,
            }
        );
    }

    #[test]
    fn layout_bounds() {
        assert!(HeaderLayout::new(0).is_err());
        assert!(HeaderLayout::new(31).is_err());
        assert_eq!(HeaderLayout::new(30).unwrap().writer_id_mask(), LENGTH_MASK);
        assert_eq!(HeaderLayout::new(1).unwrap().writer_id_mask(), 1);
        assert_eq!(HeaderLayout::default().writer_id_mask(), 0xFFFF);
    }

    #[test]
    fn oversized_length_rejected() {
        assert!(matches!(
            FrameHeader::complete(false, MAX_LENGTH + 1),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }
}
