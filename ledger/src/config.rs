//! # Ledger Configuration & Constants
//!
//! Every fixed number of the on-disk format lives here. The block layout is
//! shared with ledgers written by earlier tooling, so none of these values
//! can change without breaking every existing custody file.
//!
//! ## Block layout
//!
//! ```text
//! offset  size  field
//! 0       20    previous_digest   raw SHA-1 bytes
//! 20      4     (alignment)       zero
//! 24      8     timestamp         f64, little-endian
//! 32      16    case_id           UUID as u128, little-endian
//! 48      4     evidence_id       u32, little-endian
//! 52      11    state             ASCII, NUL-padded
//! 63      1     (alignment)       zero
//! 64      4     payload_length    u32, little-endian
//! 68      n     payload
//! ```
//!
//! The alignment bytes come from the historical writer, which packed the
//! header with native C struct alignment. They are always written as zero
//! and ignored on read.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire Format
// ---------------------------------------------------------------------------

/// Length of the chain digest stored in every header (SHA-1 output).
pub const DIGEST_LENGTH: usize = 20;

/// Width of the fixed ASCII state field.
pub const STATE_FIELD_LENGTH: usize = 11;

/// Size of an encoded block header, alignment bytes included.
pub const HEADER_LENGTH: usize = 68;

/// Payload of the genesis block. The trailing NUL is part of the record.
pub const GENESIS_PAYLOAD: &[u8] = b"Initial block\0";

/// Evidence id carried by the genesis block.
pub const GENESIS_EVIDENCE_ID: u32 = 0;

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

/// File name used when no ledger path is configured.
pub const DEFAULT_LEDGER_FILE: &str = "blockchain.bin";

/// Environment variable the command-line front end reads the ledger path from.
pub const LEDGER_PATH_ENV: &str = "BCHOC_FILE_PATH";

/// Where the ledger lives and how hard appends try to reach the disk.
///
/// Passed explicitly into [`crate::storage::FileBackend`]; nothing in the
/// crate reads the environment on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path of the flat ledger file.
    pub path: PathBuf,
    /// `fsync` the file after every append. Tests may turn this off.
    pub sync_writes: bool,
}

impl LedgerConfig {
    /// Config for a ledger at `path` with durable appends.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: true,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_FILE)
    }
}
