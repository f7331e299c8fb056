//! # Cryptographic Primitives
//!
//! The ledger's only cryptography is digest chaining: no signatures, no
//! encryption. Everything goes through [`hash::chain_digest`] so there is
//! exactly one place that decides which hash function the chain uses.

pub mod hash;

pub use hash::{chain_digest, BlockDigest};
