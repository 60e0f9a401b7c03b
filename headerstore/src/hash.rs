//! 256-bit block identity.
//!
//! The store treats a hash as an opaque, byte-for-byte comparable value. The
//! digest primitive itself (double SHA-256, as in the reference chain this
//! store is modeled on) is intentionally the *only* cryptography living in
//! this crate — everything else about header validity is someone else's
//! problem (see the crate-level docs).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 256-bit hash, stored and compared as raw bytes (no endianness applied
/// internally). Display/parsing use the conventional big-endian hex that
/// checkpoint tables and RPCs expect.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// A zero hash is the sentinel for "none" (no genesis yet, no parent, ...).
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a big-endian hex string (as used in checkpoint tables) into a hash.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut buf = [0u8; 32];
        hex::decode_to_slice(s, &mut buf)?;
        Ok(Hash256(buf))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for Hash256 {
    fn default() -> Self {
        Hash256::ZERO
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Digest an 80-byte header (or any byte slice) with double SHA-256.
///
/// Out of scope per the design: a production deployment can swap this for
/// whatever the network's actual PoW digest is. It is kept here, rather than
/// injected as a trait object, because every caller in this crate needs it
/// and it has no state of its own.
pub fn digest(bytes: &[u8]) -> Hash256 {
    let first = Sha256::digest(bytes);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    Hash256(out)
}
