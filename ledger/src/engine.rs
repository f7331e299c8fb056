//! # Command Engine
//!
//! Implements the custody commands on top of the [`Ledger`] store and the
//! custody state machine.
//!
//! Every command follows the same shape: build a [`ChainIndex`] with one
//! scan, validate the request completely against it, and only then write.
//! A rejected command therefore leaves the ledger byte-for-byte unchanged,
//! and a command that writes several blocks does so with a single append.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{LedgerConfig, GENESIS_EVIDENCE_ID, STATE_FIELD_LENGTH};
use crate::crypto::BlockDigest;
use crate::custody::{transition, Action, RemovalReason, TransitionError};
use crate::error::{LedgerError, LedgerResult};
use crate::storage::{
    Block, ChainEntry, ChainIndex, FileBackend, GenesisStatus, Ledger, LedgerBackend, MemoryBackend,
};
use crate::verifier::{self, ChainReport};

// ---------------------------------------------------------------------------
// Requests and receipts
// ---------------------------------------------------------------------------

/// Outcome of [`CustodyEngine::init`].
#[derive(Clone, Debug, PartialEq)]
pub enum InitReport {
    /// No ledger existed; this genesis block was written.
    Created(Block),
    /// A ledger with a valid genesis block was already there.
    Found(Block),
}

/// What [`CustodyEngine::add`] wrote.
#[derive(Clone, Debug, PartialEq)]
pub struct AddReceipt {
    pub case_id: Uuid,
    /// The genesis block, if the ledger had to be created first.
    pub genesis: Option<Block>,
    /// One CHECKEDIN block per requested id, in request order.
    pub blocks: Vec<Block>,
}

impl AddReceipt {
    pub fn genesis_created(&self) -> bool {
        self.genesis.is_some()
    }
}

/// Filters and ordering for [`CustodyEngine::log`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub case_ids: BTreeSet<Uuid>,
    pub item_ids: BTreeSet<u32>,
    /// Newest first.
    pub reverse: bool,
    /// At most this many entries. `None` or `Some(0)` means all.
    pub limit: Option<usize>,
}

impl LogQuery {
    /// Whether `block` passes the case and item filters.
    ///
    /// With no filters everything matches. With one kind of filter a block
    /// must match it. With both kinds a block must match both.
    pub fn matches(&self, block: &Block) -> bool {
        let by_case = self.case_ids.contains(&block.case_id());
        let by_item = self.item_ids.contains(&block.evidence_id());
        match (self.case_ids.is_empty(), self.item_ids.is_empty()) {
            (true, true) => true,
            (true, false) => by_item,
            (false, true) => by_case,
            (false, false) => by_case && by_item,
        }
    }
}

/// Outcome of [`CustodyEngine::log`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogReport {
    /// Whether reading the log had to create the ledger.
    pub genesis_created: bool,
    pub entries: Vec<LogEntry>,
}

/// One block as shown by [`CustodyEngine::log`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    pub position: usize,
    pub digest: BlockDigest,
    pub case_id: Uuid,
    pub evidence_id: u32,
    /// The raw state label; unknown labels are shown as stored.
    pub state: String,
    pub timestamp: f64,
    /// Payload text with NUL padding removed; empty for most blocks.
    pub payload: String,
}

impl From<&ChainEntry> for LogEntry {
    fn from(entry: &ChainEntry) -> Self {
        let block = &entry.block;
        Self {
            position: entry.position,
            digest: entry.digest,
            case_id: block.case_id(),
            evidence_id: block.evidence_id(),
            state: block.header.state_label(),
            timestamp: block.header.timestamp,
            payload: block.payload_text(),
        }
    }
}

/// Identity used to collapse repeated records in the log.
type LogKey = (Uuid, u32, [u8; STATE_FIELD_LENGTH], u64);

fn log_key(block: &Block) -> LogKey {
    let header = &block.header;
    (
        header.case_id,
        header.evidence_id,
        header.state,
        header.timestamp.to_bits(),
    )
}

// ---------------------------------------------------------------------------
// CustodyEngine
// ---------------------------------------------------------------------------

/// The custody commands over one ledger.
#[derive(Debug)]
pub struct CustodyEngine<B: LedgerBackend, C: Clock = SystemClock> {
    ledger: Ledger<B>,
    clock: C,
}

impl CustodyEngine<FileBackend, SystemClock> {
    /// Engine over the ledger file named by `config`, stamped with wall time.
    pub fn open(config: LedgerConfig) -> Self {
        Self::new(Ledger::open(config), SystemClock)
    }
}

impl<C: Clock> CustodyEngine<MemoryBackend, C> {
    /// Engine over an empty in-memory ledger.
    pub fn in_memory(clock: C) -> Self {
        Self::new(Ledger::in_memory(), clock)
    }
}

impl<B: LedgerBackend, C: Clock> CustodyEngine<B, C> {
    pub fn new(ledger: Ledger<B>, clock: C) -> Self {
        Self { ledger, clock }
    }

    pub fn ledger(&self) -> &Ledger<B> {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger<B> {
        self.ledger
    }

    /// Make sure a ledger exists, creating its genesis block if needed.
    ///
    /// # Errors
    ///
    /// [`LedgerError::CorruptLedger`] if an existing ledger is empty or does
    /// not start with a genesis block.
    pub fn init(&mut self) -> LedgerResult<InitReport> {
        if let GenesisStatus::Created(genesis) = self.ledger.open_or_create(self.clock.now())? {
            return Ok(InitReport::Created(genesis));
        }

        // Only the first record is read; a damaged tail is left for `verify`.
        let first = match self.ledger.iter()?.next() {
            Some(entry) => entry?,
            None => return Err(LedgerError::corrupt(0, "ledger file is empty")),
        };
        if !first.block.is_genesis() {
            return Err(LedgerError::corrupt(
                first.offset,
                format!(
                    "first block is not a valid INITIAL block (state {}, item {})",
                    first.block.header.state_label(),
                    first.block.evidence_id()
                ),
            ));
        }
        tracing::info!(digest = %first.digest, "found existing ledger");
        Ok(InitReport::Found(first.block))
    }

    /// Check new items into custody under `case_id`.
    ///
    /// Either every id gets a CHECKEDIN block or none does. If no ledger
    /// exists yet, its genesis block is written in the same append.
    pub fn add(&mut self, case_id: Uuid, item_ids: &[u32]) -> LedgerResult<AddReceipt> {
        if item_ids.is_empty() {
            return Err(LedgerError::Input("at least one item id is required".into()));
        }
        if case_id.is_nil() {
            return Err(LedgerError::Input(
                "the nil UUID is reserved for the genesis block".into(),
            ));
        }
        let mut seen = HashSet::with_capacity(item_ids.len());
        for &id in item_ids {
            if !seen.insert(id) {
                return Err(LedgerError::Input(format!("item {id} listed more than once")));
            }
        }

        let index = self.ledger.index()?;
        let genesis = if index.is_present() {
            None
        } else {
            Some(Block::genesis(self.clock.now()))
        };
        let mut tip = match &genesis {
            Some(block) => block.digest().map_err(LedgerError::Encoding)?,
            None => existing_tip(&index)?,
        };

        let mut blocks = Vec::with_capacity(item_ids.len());
        for &id in item_ids {
            let taken = if genesis.is_some() {
                id == GENESIS_EVIDENCE_ID
            } else {
                index.contains(id)
            };
            if taken {
                return Err(LedgerError::DuplicateItem(id));
            }
            let state = transition(None, Action::Add)
                .map_err(|source| LedgerError::IllegalTransition { item: id, source })?;
            let block = Block::new(tip, self.clock.now(), case_id, id, state, Vec::new());
            tip = block.digest().map_err(LedgerError::Encoding)?;
            blocks.push(block);
        }

        let batch: Vec<Block> = genesis.iter().chain(&blocks).cloned().collect();
        self.ledger.append_all(&batch)?;
        for block in &blocks {
            log_appended(block);
        }

        Ok(AddReceipt {
            case_id,
            genesis,
            blocks,
        })
    }

    /// Hand a checked-in item out to an investigator.
    pub fn checkout(&mut self, item_id: u32) -> LedgerResult<Block> {
        self.advance(item_id, Action::Checkout, Vec::new())
    }

    /// Return a checked-out item to the evidence room.
    pub fn checkin(&mut self, item_id: u32) -> LedgerResult<Block> {
        self.advance(item_id, Action::Checkin, Vec::new())
    }

    /// Take a checked-in item out of custody for good.
    ///
    /// RELEASED needs a non-empty `owner`, which becomes the block payload.
    /// For the other reasons an owner is ignored.
    pub fn remove(
        &mut self,
        item_id: u32,
        reason: RemovalReason,
        owner: Option<&str>,
    ) -> LedgerResult<Block> {
        let owner = owner.filter(|o| !o.trim().is_empty());
        let payload = if reason.requires_owner() {
            match owner {
                Some(owner) => owner.as_bytes().to_vec(),
                None => {
                    return Err(LedgerError::Input(format!(
                        "removal as {reason} requires a non-empty owner"
                    )))
                }
            }
        } else {
            if owner.is_some() {
                tracing::warn!(item = item_id, %reason, "owner is only recorded for RELEASED; ignoring it");
            }
            Vec::new()
        };
        self.advance(item_id, Action::Remove(reason), payload)
    }

    /// Blocks matching `query`, deduplicated, in file order unless reversed.
    ///
    /// Creates the ledger if it does not exist yet.
    pub fn log(&mut self, query: &LogQuery) -> LedgerResult<LogReport> {
        let status = self.ledger.open_or_create(self.clock.now())?;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for entry in self.ledger.iter()? {
            let entry = entry?;
            if query.matches(&entry.block) && seen.insert(log_key(&entry.block)) {
                entries.push(LogEntry::from(&entry));
            }
        }

        if query.reverse {
            entries.reverse();
        }
        if let Some(limit) = query.limit.filter(|&n| n > 0) {
            entries.truncate(limit);
        }

        Ok(LogReport {
            genesis_created: status.created(),
            entries,
        })
    }

    /// Check the whole chain. Never writes.
    pub fn verify(&self) -> LedgerResult<ChainReport> {
        verifier::verify(&self.ledger)
    }

    /// Move an existing item through `action` and append the resulting block.
    fn advance(&mut self, item_id: u32, action: Action, payload: Vec<u8>) -> LedgerResult<Block> {
        let index = self.ledger.index()?;
        let illegal = |source| LedgerError::IllegalTransition { item: item_id, source };

        let head = index.head(item_id);
        let current = head
            .map(|h| {
                h.block
                    .state()
                    .map_err(|e| LedgerError::corrupt(h.offset, e.to_string()))
            })
            .transpose()?;
        let next = transition(current, action).map_err(illegal)?;
        let Some(head) = head else {
            return Err(illegal(TransitionError { from: None, action }));
        };

        let tip = existing_tip(&index)?;
        let block = Block::new(tip, self.clock.now(), head.block.case_id(), item_id, next, payload);
        self.ledger.append(&block)?;
        log_appended(&block);
        Ok(block)
    }
}

/// The tip of a ledger that is expected to hold at least a genesis block.
fn existing_tip(index: &ChainIndex) -> LedgerResult<BlockDigest> {
    index
        .tip()
        .ok_or_else(|| LedgerError::corrupt(0, "ledger file is empty"))
}

fn log_appended(block: &Block) {
    tracing::info!(
        case_id = %block.case_id(),
        evidence_id = block.evidence_id(),
        state = %block.header.state_label(),
        "custody block recorded"
    );
}
