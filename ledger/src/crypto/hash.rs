//! # Chain Digest
//!
//! Every block names its parent by the SHA-1 digest of the parent's full
//! encoded bytes (header + payload). Existing custody files use SHA-1, so
//! the digest width is fixed at 20 bytes.
//!
//! [`BlockDigest`] renders as lowercase hex in logs, reports and JSON.

use std::fmt;

use serde::{Serialize, Serializer};
use sha1::{Digest, Sha1};

use crate::config::DIGEST_LENGTH;

/// A 160-bit chain digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockDigest([u8; DIGEST_LENGTH]);

impl BlockDigest {
    /// The all-zero digest carried by the genesis block as its parent.
    pub const ZERO: BlockDigest = BlockDigest([0u8; DIGEST_LENGTH]);

    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; DIGEST_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes, in the order they are stored on disk.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LENGTH] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// True for [`BlockDigest::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_LENGTH]
    }
}

impl fmt::Display for BlockDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BlockDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockDigest({})", self.to_hex())
    }
}

impl Serialize for BlockDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Compute the chain digest of an encoded block.
///
/// `encoded` must be the complete record exactly as stored: the 68-byte
/// header immediately followed by the payload. Hashing anything else (a
/// re-encoding, the header alone) breaks linkage with blocks written by
/// other tools.
///
/// # Example
///
/// ```
/// use bchoc_ledger::crypto::chain_digest;
///
/// let digest = chain_digest(b"abc");
/// assert_eq!(digest.to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
/// ```
pub fn chain_digest(encoded: &[u8]) -> BlockDigest {
    let mut hasher = Sha1::new();
    hasher.update(encoded);
    let result = hasher.finalize();
    let mut output = [0u8; DIGEST_LENGTH];
    output.copy_from_slice(&result);
    BlockDigest(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_known_vector() {
        // FIPS 180-1 "abc" test vector.
        assert_eq!(
            chain_digest(b"abc").to_hex(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn empty_input_known_vector() {
        assert_eq!(
            chain_digest(b"").to_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn single_bit_flip_changes_digest() {
        let mut data = vec![0x42u8; 96];
        let before = chain_digest(&data);
        data[40] ^= 0x01;
        assert_ne!(before, chain_digest(&data));
    }

    #[test]
    fn zero_digest_is_zero() {
        assert!(BlockDigest::ZERO.is_zero());
        assert!(!chain_digest(b"x").is_zero());
        assert_eq!(BlockDigest::default(), BlockDigest::ZERO);
    }

    #[test]
    fn digest_serializes_as_hex_string() {
        let digest = BlockDigest::from_bytes([0xAB; DIGEST_LENGTH]);
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(DIGEST_LENGTH)));
    }

    #[test]
    fn display_matches_to_hex() {
        let digest = chain_digest(b"custody");
        assert_eq!(digest.to_string(), digest.to_hex());
        assert_eq!(digest.to_hex().len(), DIGEST_LENGTH * 2);
    }
}
