//! Log records and their on-disk framing.
//!
//! Every frame is `len: u32 LE | crc32(len): u32 LE | crc32(payload): u32 LE |
//! payload`, where the payload is the bincode encoding of a [`LogRecord`].
//! The length carries its own checksum so a damaged length is never mistaken
//! for a frame that runs past the end of the file.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Size of the `len + crc(len) + crc(payload)` prefix in front of every payload
pub const FRAME_HEADER_SIZE: usize = 12;

/// A single committed mutation of the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecord {
    CreateCollection {
        name: String,
    },
    DropCollection {
        name: String,
    },
    Put {
        collection: String,
        key: String,
        value: Vec<u8>,
    },
    Delete {
        collection: String,
        key: String,
    },
}

impl LogRecord {
    /// Encode the record as a complete frame ready to append
    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let len = (payload.len() as u32).to_le_bytes();

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&len);
        frame.extend_from_slice(&crc32fast::hash(&len).to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a payload whose checksum has already been verified
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(payload)?)
    }
}

/// Result of trying to read one frame from a byte buffer
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A complete frame with a matching checksum
    Valid { payload: &'a [u8], len: usize },
    /// Fewer bytes left than a frame header, or a verified header that
    /// announces more payload than remains
    Truncated,
    /// A header or payload whose checksum does not match
    Corrupt,
}

/// Read the frame at the start of `buf`
pub fn read_frame(buf: &[u8]) -> Frame<'_> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Frame::Truncated;
    }

    let len_bytes = [buf[0], buf[1], buf[2], buf[3]];
    let len_checksum = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let checksum = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);

    if crc32fast::hash(&len_bytes) != len_checksum {
        return Frame::Corrupt;
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    let end = match FRAME_HEADER_SIZE.checked_add(len) {
        Some(end) if end <= buf.len() => end,
        _ => return Frame::Truncated,
    };

    let payload = &buf[FRAME_HEADER_SIZE..end];
    if crc32fast::hash(payload) != checksum {
        return Frame::Corrupt;
    }

    Frame::Valid { payload, len: end }
}
