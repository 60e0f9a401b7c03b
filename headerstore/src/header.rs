//! The 80-byte on-the-wire block header.
//!
//! Layout (little-endian integers, exactly as the reference chain serializes
//! it — this is the format that hits disk verbatim in [`crate::log`]):
//!
//! ```text
//! offset  size  field
//! 0       4     version
//! 4       32    prev_block
//! 36      32    merkle_root
//! 68      4     timestamp
//! 72      4     bits
//! 76      4     nonce
//! ```
//!
//! Everything beyond `prev_block` and `timestamp` is carried opaquely: this
//! crate never inspects `bits`/`nonce`/`merkle_root`, it only needs the
//! header to round-trip through 80 bytes and to expose `prev_block` for
//! chain linkage and `timestamp` for birth-time queries.

use crate::hash::Hash256;

pub const HEADER_SIZE: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..36].copy_from_slice(self.prev_block.as_bytes());
        buf[36..68].copy_from_slice(self.merkle_root.as_bytes());
        buf[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[72..76].copy_from_slice(&self.bits.to_le_bytes());
        buf[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        let mut prev = [0u8; 32];
        prev.copy_from_slice(&buf[4..36]);
        let mut merkle = [0u8; 32];
        merkle.copy_from_slice(&buf[36..68]);
        BlockHeader {
            version: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            prev_block: Hash256(prev),
            merkle_root: Hash256(merkle),
            timestamp: u32::from_le_bytes(buf[68..72].try_into().unwrap()),
            bits: u32::from_le_bytes(buf[72..76].try_into().unwrap()),
            nonce: u32::from_le_bytes(buf[76..80].try_into().unwrap()),
        }
    }

    /// Identity of this header: double-SHA256 of its 80-byte encoding.
    pub fn hash(&self) -> Hash256 {
        crate::hash::digest(&self.to_bytes())
    }
}
