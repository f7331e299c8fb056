//! # Ledger Store
//!
//! Physical access to the ordered block sequence. The store frames records
//! out of a [`LedgerBackend`], computes each record's chain digest over the
//! exact bytes read, and appends new records. It enforces nothing about
//! custody; that is the command engine's job.
//!
//! Every read is a fresh forward scan from byte zero. There is no cache
//! between calls, so two scans always agree with what is on disk.

use std::collections::HashMap;
use std::io::{self, Read};
use std::time::Instant;

use crate::config::{LedgerConfig, HEADER_LENGTH};
use crate::crypto::{chain_digest, BlockDigest};
use crate::error::{LedgerError, LedgerResult};

use super::backend::{FileBackend, LedgerBackend, MemoryBackend};
use super::block::{decode_header, Block};

// ---------------------------------------------------------------------------
// ChainEntry
// ---------------------------------------------------------------------------

/// A block as found in the store, with where it was found and its digest.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainEntry {
    /// Zero-based position in file order; genesis is 0.
    pub position: usize,
    /// Byte offset of the record's header.
    pub offset: u64,
    /// Chain digest of the stored record bytes.
    pub digest: BlockDigest,
    pub block: Block,
}

/// Whether [`Ledger::open_or_create`] had to write a genesis block.
#[derive(Clone, Debug, PartialEq)]
pub enum GenesisStatus {
    /// A ledger was already present and was left untouched.
    Existing,
    /// No ledger was present; this genesis block was written.
    Created(Block),
}

impl GenesisStatus {
    pub fn created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

// ---------------------------------------------------------------------------
// Blocks iterator
// ---------------------------------------------------------------------------

/// Lazy forward scan over the stored blocks.
///
/// Yields `Err` at most once: after a truncated record or an I/O fault the
/// iterator is exhausted.
pub struct Blocks<'a> {
    reader: Box<dyn Read + 'a>,
    position: usize,
    offset: u64,
    done: bool,
}

impl<'a> Blocks<'a> {
    fn new(reader: Box<dyn Read + 'a>) -> Self {
        Self {
            reader,
            position: 0,
            offset: 0,
            done: false,
        }
    }

    fn read_entry(&mut self) -> LedgerResult<Option<ChainEntry>> {
        let mut header = [0u8; HEADER_LENGTH];
        let got = fill(&mut self.reader, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_LENGTH {
            return Err(LedgerError::corrupt(
                self.offset,
                format!("truncated header: {got} of {HEADER_LENGTH} bytes"),
            ));
        }

        let header_fields = decode_header(&header);
        let declared = u64::from(header_fields.payload_length);
        let mut payload = Vec::new();
        (&mut self.reader).take(declared).read_to_end(&mut payload)?;
        if (payload.len() as u64) < declared {
            return Err(LedgerError::corrupt(
                self.offset,
                format!(
                    "truncated payload: {} of {declared} bytes",
                    payload.len()
                ),
            ));
        }

        let mut record = Vec::with_capacity(HEADER_LENGTH + payload.len());
        record.extend_from_slice(&header);
        record.extend_from_slice(&payload);

        let entry = ChainEntry {
            position: self.position,
            offset: self.offset,
            digest: chain_digest(&record),
            block: Block {
                header: header_fields,
                payload,
            },
        };
        self.position += 1;
        self.offset += record.len() as u64;
        Ok(Some(entry))
    }
}

impl Iterator for Blocks<'_> {
    type Item = LedgerResult<ChainEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn fill(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// ChainIndex
// ---------------------------------------------------------------------------

/// Everything a command needs to know about the chain, from one scan.
#[derive(Clone, Debug, Default)]
pub struct ChainIndex {
    present: bool,
    tip: Option<BlockDigest>,
    block_count: usize,
    heads: HashMap<u32, ChainEntry>,
}

impl ChainIndex {
    /// Whether the ledger existed when the index was built.
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Digest of the last block in file order.
    pub fn tip(&self) -> Option<BlockDigest> {
        self.tip
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// The latest block for `evidence_id`.
    pub fn head(&self, evidence_id: u32) -> Option<&ChainEntry> {
        self.heads.get(&evidence_id)
    }

    /// Whether any block anywhere carries `evidence_id`.
    pub fn contains(&self, evidence_id: u32) -> bool {
        self.heads.contains_key(&evidence_id)
    }

    fn record(&mut self, entry: ChainEntry) {
        self.tip = Some(entry.digest);
        self.block_count += 1;
        self.heads.insert(entry.block.evidence_id(), entry);
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The append-only block store.
#[derive(Debug)]
pub struct Ledger<B: LedgerBackend> {
    backend: B,
}

impl Ledger<FileBackend> {
    /// A store over the file named by `config`. Nothing is read or created yet.
    pub fn open(config: LedgerConfig) -> Self {
        Self::with_backend(FileBackend::new(config))
    }
}

impl Ledger<MemoryBackend> {
    /// A store with no ledger yet, held in memory.
    pub fn in_memory() -> Self {
        Self::with_backend(MemoryBackend::new())
    }
}

impl<B: LedgerBackend> Ledger<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Whether a ledger has been created.
    pub fn is_present(&self) -> LedgerResult<bool> {
        Ok(self.backend.is_present()?)
    }

    /// Stored size in bytes.
    pub fn byte_len(&self) -> LedgerResult<u64> {
        Ok(self.backend.len()?)
    }

    /// Create the ledger with a genesis block stamped `timestamp`, unless one
    /// already exists. An existing ledger is never touched.
    pub fn open_or_create(&mut self, timestamp: f64) -> LedgerResult<GenesisStatus> {
        if self.backend.is_present()? {
            return Ok(GenesisStatus::Existing);
        }
        let genesis = Block::genesis(timestamp);
        let digest = self.append(&genesis)?;
        tracing::info!(digest = %digest, "created ledger with genesis block");
        Ok(GenesisStatus::Created(genesis))
    }

    /// A fresh forward scan from the first block.
    pub fn iter(&self) -> LedgerResult<Blocks<'_>> {
        Ok(Blocks::new(self.backend.reader()?))
    }

    /// Append one block.
    pub fn append(&mut self, block: &Block) -> LedgerResult<BlockDigest> {
        let digests = self.append_all(std::slice::from_ref(block))?;
        Ok(digests[0])
    }

    /// Append several blocks with a single backend write.
    ///
    /// Every block is encoded before anything is written, so an encoding
    /// failure leaves the store untouched. Returns each block's digest.
    pub fn append_all(&mut self, blocks: &[Block]) -> LedgerResult<Vec<BlockDigest>> {
        let mut buffer = Vec::new();
        let mut digests = Vec::with_capacity(blocks.len());
        for block in blocks {
            let encoded = block.encode().map_err(LedgerError::Encoding)?;
            digests.push(chain_digest(&encoded));
            buffer.extend_from_slice(&encoded);
        }
        if buffer.is_empty() {
            return Ok(digests);
        }
        self.backend.append(&buffer)?;
        for (block, digest) in blocks.iter().zip(&digests) {
            tracing::debug!(
                evidence_id = block.evidence_id(),
                state = %block.header.state_label(),
                digest = %digest,
                "block appended"
            );
        }
        Ok(digests)
    }

    /// The block with the greatest file position carrying `evidence_id`.
    pub fn find_last(&self, evidence_id: u32) -> LedgerResult<Option<ChainEntry>> {
        let mut last = None;
        for entry in self.iter()? {
            let entry = entry?;
            if entry.block.evidence_id() == evidence_id {
                last = Some(entry);
            }
        }
        Ok(last)
    }

    /// Whether any block carries `evidence_id`.
    pub fn exists(&self, evidence_id: u32) -> LedgerResult<bool> {
        for entry in self.iter()? {
            if entry?.block.evidence_id() == evidence_id {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Build a [`ChainIndex`] with one scan.
    pub fn index(&self) -> LedgerResult<ChainIndex> {
        let started = Instant::now();
        let mut index = ChainIndex {
            present: self.backend.is_present()?,
            ..ChainIndex::default()
        };
        for entry in self.iter()? {
            index.record(entry?);
        }
        tracing::debug!(
            blocks = index.block_count,
            elapsed_us = started.elapsed().as_micros() as u64,
            "chain scanned"
        );
        Ok(index)
    }
}
