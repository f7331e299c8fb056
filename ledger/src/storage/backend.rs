//! Byte-level storage backends for the ledger.
//!
//! A backend only knows how to hand out a fresh reader over the whole ledger
//! and how to append bytes to its end. Framing, digests and validation all
//! live one layer up in [`super::ledger`]. Two implementations ship:
//!
//! - [`FileBackend`]: the flat on-disk file named by [`LedgerConfig`].
//! - [`MemoryBackend`]: a byte vector, for tests and for callers that want to
//!   inspect or doctor raw ledger bytes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::Path;

use crate::config::LedgerConfig;

/// Append-only byte storage.
///
/// Implementations must never rewrite bytes that are already stored;
/// [`LedgerBackend::append`] is the only mutating operation.
pub trait LedgerBackend {
    /// Whether a ledger has been created yet.
    fn is_present(&self) -> io::Result<bool>;

    /// A reader positioned at the first stored byte. Empty when absent.
    fn reader(&self) -> io::Result<Box<dyn Read + '_>>;

    /// Append `bytes` in one write, creating the ledger if needed.
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Stored size in bytes; zero when absent.
    fn len(&self) -> io::Result<u64>;
}

// ---------------------------------------------------------------------------
// FileBackend
// ---------------------------------------------------------------------------

/// The ledger as a flat file of concatenated blocks.
#[derive(Debug, Clone)]
pub struct FileBackend {
    config: LedgerConfig,
}

impl FileBackend {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl LedgerBackend for FileBackend {
    fn is_present(&self) -> io::Result<bool> {
        self.config.path.try_exists()
    }

    fn reader(&self) -> io::Result<Box<dyn Read + '_>> {
        match File::open(&self.config.path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Box::new(io::empty())),
            Err(e) => Err(e),
        }
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)?;
        file.write_all(bytes)?;
        file.flush()?;
        if self.config.sync_writes {
            file.sync_data()?;
        }
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        match fs::metadata(&self.config.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// In-memory ledger bytes. `None` means no ledger has been created.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    bytes: Option<Vec<u8>>,
}

impl MemoryBackend {
    /// An absent ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger that already holds `bytes`, well-formed or not.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes: Some(bytes) }
    }

    /// Stored bytes; empty when absent.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_deref().unwrap_or_default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.unwrap_or_default()
    }
}

impl LedgerBackend for MemoryBackend {
    fn is_present(&self) -> io::Result<bool> {
        Ok(self.bytes.is_some())
    }

    fn reader(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.as_bytes())))
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.bytes.get_or_insert_with(Vec::new).extend_from_slice(bytes);
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.as_bytes().len() as u64)
    }
}
