//! # Storage Module
//!
//! The custody ledger on disk: how a block is laid out in bytes, and how the
//! ordered sequence of blocks is read and extended.
//!
//! ## Architecture
//!
//! ```text
//! block.rs   : Block structure, fixed binary codec, genesis block
//! backend.rs : Byte storage: flat file or in-memory vector
//! ledger.rs  : Framing, digests, scans, lookups, atomic append
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! Block ──encode──▶ bytes ──append──▶ LedgerBackend
//!                                           │
//! ChainEntry ◀──frame + SHA-1──── reader ◀──┘
//! ```
//!
//! ## Design Decisions
//!
//! 1. **No file header, no index on disk.** The ledger is nothing but
//!    concatenated records, so any tool that knows the 68-byte header can
//!    read it.
//!
//! 2. **Digests are computed over stored bytes.** A scan hashes exactly what
//!    it read rather than re-encoding the parsed block, so tampering with
//!    padding or garbage in the state field still changes the digest.
//!
//! 3. **One write per command.** Multi-block appends are encoded into one
//!    buffer and written with a single call.

pub mod backend;
pub mod block;
pub mod ledger;

pub use backend::{FileBackend, LedgerBackend, MemoryBackend};
pub use block::{decode, encode, Block, BlockHeader};
pub use ledger::{Blocks, ChainEntry, ChainIndex, GenesisStatus, Ledger};
