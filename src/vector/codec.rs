//! Fixed-width byte encoding for embeddings.
//!
//! Each component is stored as its 8 byte little-endian IEEE-754 bit
//! pattern, so every value (including NaN payloads and infinities)
//! round-trips exactly.

use super::types::Embedding;
use crate::error::{LimoncelloError, Result};

/// Bytes per encoded component
pub const COMPONENT_SIZE: usize = std::mem::size_of::<f64>();

/// Encode a vector as `8 * len` bytes
pub fn encode(vector: &[f64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(vector.len() * COMPONENT_SIZE);
    for component in vector {
        buf.extend_from_slice(&component.to_bits().to_le_bytes());
    }
    buf
}

/// Decode bytes produced by [`encode`].
///
/// A buffer whose length is not a multiple of 8 cannot have come from
/// `encode` and is rejected.
pub fn decode(buf: &[u8]) -> Result<Embedding> {
    if buf.len() % COMPONENT_SIZE != 0 {
        return Err(LimoncelloError::MalformedInput(format!(
            "Encoded vector length {} is not a multiple of {}",
            buf.len(),
            COMPONENT_SIZE
        )));
    }

    Ok(buf
        .chunks_exact(COMPONENT_SIZE)
        .map(|chunk| {
            let mut bits = [0u8; COMPONENT_SIZE];
            bits.copy_from_slice(chunk);
            f64::from_bits(u64::from_le_bytes(bits))
        })
        .collect())
}
