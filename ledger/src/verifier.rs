//! # Chain Verifier
//!
//! Replays the whole ledger in one forward pass and reports the first
//! integrity violation, or a clean bill of health with the block count.
//!
//! ## Rules, in priority order
//!
//! During the pass, per block:
//!
//! 1. The record must frame (header and full payload present). A framing
//!    failure is fatal and surfaces as [`LedgerError::CorruptLedger`].
//! 2. No block may follow a terminal state for the same item.
//! 3. No block may repeat the item's immediately preceding state.
//! 4. The state field must name a known custody state.
//! 5. A RELEASED block must carry an owner payload.
//!
//! After the pass, over all blocks:
//!
//! 6. Every non-genesis block's parent digest must be the digest of some
//!    block in the chain.
//! 7. No two blocks may declare the same parent (a fork).
//!
//! Per-item history is keyed strictly by evidence id, so interleaved items
//! never see each other's states.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::config::STATE_FIELD_LENGTH;
use crate::crypto::BlockDigest;
use crate::custody::CustodyState;
use crate::error::LedgerResult;
use crate::storage::{ChainEntry, Ledger, LedgerBackend};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Which rule a chain broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A block for an item that had already been disposed/destroyed/released.
    AfterTerminal,
    /// Two consecutive blocks for an item with the same state.
    RepeatedState,
    /// The state field is not one of the six custody states.
    UnknownState,
    /// A RELEASED block with an empty payload.
    MissingOwner,
    /// The declared parent digest matches no block in the chain.
    ParentNotFound,
    /// Two blocks declare the same parent.
    Fork,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AfterTerminal => "bad block after terminal state",
            Self::RepeatedState => "illegal repeated state",
            Self::UnknownState => "unknown state",
            Self::MissingOwner => "released without owner",
            Self::ParentNotFound => "parent not found",
            Self::Fork => "two blocks found with same parent",
        })
    }
}

/// The first integrity violation found in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// File-order position of the offending block.
    pub position: usize,
    pub evidence_id: u32,
    /// Computed digest of the offending block.
    pub block: BlockDigest,
    /// The parent digest involved, for linkage violations.
    pub parent: Option<BlockDigest>,
    /// For forks: the earlier block that declared the same parent.
    pub sibling: Option<BlockDigest>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at block {} (position {}, item {})",
            self.kind, self.block, self.position, self.evidence_id
        )?;
        if let Some(parent) = self.parent {
            write!(f, ", parent {parent}")?;
        }
        if let Some(sibling) = self.sibling {
            write!(f, ", sibling {sibling}")?;
        }
        Ok(())
    }
}

/// Outcome of [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Blocks examined. The whole chain when clean.
    pub block_count: usize,
    pub violation: Option<Violation>,
}

impl ChainReport {
    pub fn is_clean(&self) -> bool {
        self.violation.is_none()
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify the whole chain. Never writes to the ledger.
///
/// # Errors
///
/// Storage faults and unframeable records. Integrity violations are not
/// errors; they come back in [`ChainReport::violation`].
pub fn verify<B: LedgerBackend>(ledger: &Ledger<B>) -> LedgerResult<ChainReport> {
    let mut pass = Pass::default();

    for entry in ledger.iter()? {
        let entry = entry?;
        if let Some(violation) = pass.check(&entry) {
            return Ok(report(pass.digests.len(), Some(violation)));
        }
    }

    let violation = pass.parent_not_found().or_else(|| pass.fork());
    Ok(report(pass.digests.len(), violation))
}

fn report(block_count: usize, violation: Option<Violation>) -> ChainReport {
    match &violation {
        Some(v) => tracing::warn!(violation = %v, "chain verification failed"),
        None => tracing::info!(blocks = block_count, "chain verified clean"),
    }
    ChainReport {
        block_count,
        violation,
    }
}

/// State accumulated over the forward pass.
#[derive(Default)]
struct Pass {
    last_state: HashMap<u32, [u8; STATE_FIELD_LENGTH]>,
    digests: Vec<BlockDigest>,
    parents: Vec<BlockDigest>,
    evidence_ids: Vec<u32>,
}

impl Pass {
    fn check(&mut self, entry: &ChainEntry) -> Option<Violation> {
        let header = &entry.block.header;
        let id = header.evidence_id;

        self.digests.push(entry.digest);
        self.parents.push(header.previous_digest);
        self.evidence_ids.push(id);

        let violation = |kind| Violation {
            kind,
            position: entry.position,
            evidence_id: id,
            block: entry.digest,
            parent: None,
            sibling: None,
        };

        if let Some(previous) = self.last_state.get(&id) {
            let was_terminal =
                CustodyState::from_field(previous).is_some_and(|s| s.is_terminal());
            if was_terminal {
                return Some(violation(ViolationKind::AfterTerminal));
            }
            if *previous == header.state {
                return Some(violation(ViolationKind::RepeatedState));
            }
        }

        let state = CustodyState::from_field(&header.state);
        if state.is_none() {
            return Some(violation(ViolationKind::UnknownState));
        }
        if state == Some(CustodyState::Released) && header.payload_length == 0 {
            return Some(violation(ViolationKind::MissingOwner));
        }

        self.last_state.insert(id, header.state);
        None
    }

    fn parent_not_found(&self) -> Option<Violation> {
        let known: HashSet<&BlockDigest> = self.digests.iter().collect();
        self.parents
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, parent)| !known.contains(parent))
            .map(|(position, parent)| Violation {
                kind: ViolationKind::ParentNotFound,
                position,
                evidence_id: self.evidence_ids[position],
                block: self.digests[position],
                parent: Some(*parent),
                sibling: None,
            })
    }

    fn fork(&self) -> Option<Violation> {
        let mut first_child: HashMap<BlockDigest, usize> = HashMap::new();
        for (position, parent) in self.parents.iter().enumerate() {
            if let Some(&earlier) = first_child.get(parent) {
                return Some(Violation {
                    kind: ViolationKind::Fork,
                    position,
                    evidence_id: self.evidence_ids[position],
                    block: self.digests[position],
                    parent: Some(*parent),
                    sibling: Some(self.digests[earlier]),
                });
            }
            first_child.insert(*parent, position);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block::state_field;
    use crate::storage::{Block, MemoryBackend};
    use uuid::Uuid;

    const CASE: u128 = 0x65cc_391d_6568_4dcc_a3f1_86a2_f041_40f3;

    /// Builds raw ledgers block by block, linking each to the previous one.
    struct ChainBuilder {
        blocks: Vec<Block>,
    }

    impl ChainBuilder {
        fn new() -> Self {
            Self {
                blocks: vec![Block::genesis(1.0)],
            }
        }

        fn tip(&self) -> BlockDigest {
            self.blocks.last().unwrap().digest().unwrap()
        }

        fn push(mut self, id: u32, state: CustodyState, payload: &[u8]) -> Self {
            let ts = self.blocks.len() as f64 + 1.0;
            let block = Block::new(
                self.tip(),
                ts,
                Uuid::from_u128(CASE),
                id,
                state,
                payload.to_vec(),
            );
            self.blocks.push(block);
            self
        }

        fn push_block(mut self, block: Block) -> Self {
            self.blocks.push(block);
            self
        }

        fn ledger(&self) -> Ledger<MemoryBackend> {
            let mut bytes = Vec::new();
            for block in &self.blocks {
                bytes.extend(block.encode().unwrap());
            }
            Ledger::with_backend(MemoryBackend::from_bytes(bytes))
        }

        fn verify(&self) -> ChainReport {
            verify(&self.ledger()).unwrap()
        }
    }

    use CustodyState::*;

    #[test]
    fn full_lifecycle_is_clean() {
        let report = ChainBuilder::new()
            .push(1, CheckedIn, b"")
            .push(2, CheckedIn, b"")
            .push(1, CheckedOut, b"")
            .push(2, CheckedOut, b"")
            .push(1, CheckedIn, b"")
            .push(1, Released, b"Ada Owner")
            .push(2, CheckedIn, b"")
            .push(2, Destroyed, b"")
            .verify();
        assert_eq!(
            report,
            ChainReport {
                block_count: 9,
                violation: None
            }
        );
    }

    #[test]
    fn absent_ledger_is_clean_and_empty() {
        let report = verify(&Ledger::in_memory()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.block_count, 0);
    }

    #[test]
    fn block_after_terminal_state() {
        let chain = ChainBuilder::new()
            .push(1, CheckedIn, b"")
            .push(1, Disposed, b"")
            .push(1, CheckedIn, b"");
        let report = chain.verify();
        let violation = report.violation.unwrap();
        assert_eq!(violation.kind, ViolationKind::AfterTerminal);
        assert_eq!(violation.position, 3);
        assert_eq!(violation.block, chain.tip());
        assert_eq!(report.block_count, 4);
    }

    #[test]
    fn double_checkout() {
        let report = ChainBuilder::new()
            .push(1, CheckedIn, b"")
            .push(1, CheckedOut, b"")
            .push(1, CheckedOut, b"")
            .verify();
        assert_eq!(report.violation.unwrap().kind, ViolationKind::RepeatedState);
    }

    #[test]
    fn interleaved_items_do_not_interfere() {
        // Two CHECKEDIN blocks in a row, but for different items.
        let report = ChainBuilder::new()
            .push(1, CheckedIn, b"")
            .push(2, CheckedIn, b"")
            .push(1, CheckedOut, b"")
            .push(2, CheckedOut, b"")
            .verify();
        assert!(report.is_clean());
    }

    #[test]
    fn unknown_state() {
        let chain = ChainBuilder::new().push(1, CheckedIn, b"");
        let mut forged = Block::new(chain.tip(), 9.0, Uuid::from_u128(CASE), 1, CheckedOut, vec![]);
        forged.header.state = state_field("MISPLACED").unwrap();
        let report = chain.push_block(forged).verify();
        let violation = report.violation.unwrap();
        assert_eq!(violation.kind, ViolationKind::UnknownState);
        assert_eq!(violation.position, 2);
    }

    #[test]
    fn released_without_owner() {
        let report = ChainBuilder::new()
            .push(1, CheckedIn, b"")
            .push(1, Released, b"")
            .verify();
        assert_eq!(report.violation.unwrap().kind, ViolationKind::MissingOwner);
    }

    #[test]
    fn tampered_block_breaks_child_linkage() {
        let chain = ChainBuilder::new()
            .push(1, CheckedIn, b"")
            .push(2, CheckedIn, b"")
            .push(1, CheckedOut, b"");
        let mut bytes = chain.ledger().into_backend().into_bytes();
        let untampered_digest = chain.blocks[2].digest().unwrap();
        // Flip a bit in block 2's evidence id (genesis is 82 bytes, block 1 is 68).
        let block2 = 82 + 68;
        bytes[block2 + 48] ^= 0x04;

        let ledger = Ledger::with_backend(MemoryBackend::from_bytes(bytes));
        let violation = verify(&ledger).unwrap().violation.unwrap();
        assert_eq!(violation.kind, ViolationKind::ParentNotFound);
        assert_eq!(violation.position, 3);
        assert_eq!(violation.parent, Some(untampered_digest));
    }

    #[test]
    fn fork_identifies_both_children() {
        let chain = ChainBuilder::new().push(1, CheckedIn, b"");
        let parent = chain.blocks[0].digest().unwrap();
        let first_child = chain.tip();
        let spliced = Block::new(parent, 50.0, Uuid::from_u128(CASE), 2, CheckedIn, vec![]);
        let spliced_digest = spliced.digest().unwrap();

        let violation = chain.push_block(spliced).verify().violation.unwrap();
        assert_eq!(violation.kind, ViolationKind::Fork);
        assert_eq!(violation.position, 2);
        assert_eq!(violation.block, spliced_digest);
        assert_eq!(violation.parent, Some(parent));
        assert_eq!(violation.sibling, Some(first_child));
    }

    #[test]
    fn missing_parent_outranks_fork() {
        let chain = ChainBuilder::new().push(1, CheckedIn, b"");
        let parent = chain.blocks[0].digest().unwrap();
        let sibling = Block::new(parent, 3.0, Uuid::from_u128(CASE), 2, CheckedIn, vec![]);
        let orphan = Block::new(
            BlockDigest::from_bytes([0xEE; 20]),
            4.0,
            Uuid::from_u128(CASE),
            3,
            CheckedIn,
            vec![],
        );
        let report = chain.push_block(sibling).push_block(orphan).verify();
        assert_eq!(report.violation.unwrap().kind, ViolationKind::ParentNotFound);
    }

    #[test]
    fn repeated_state_outranks_missing_parent() {
        // Linkage is only judged after the forward pass.
        let chain = ChainBuilder::new().push(1, CheckedIn, b"");
        let orphan = Block::new(
            BlockDigest::from_bytes([0xEE; 20]),
            3.0,
            Uuid::from_u128(CASE),
            1,
            CheckedIn,
            vec![],
        );
        let report = chain.push_block(orphan).verify();
        let violation = report.violation.unwrap();
        assert_eq!(violation.kind, ViolationKind::RepeatedState);
        assert_eq!(violation.position, 2);
        assert_eq!(violation.parent, None);
    }

    #[test]
    fn duplicated_block_is_a_repeated_state_not_a_fork() {
        let chain = ChainBuilder::new().push(1, CheckedIn, b"");
        let copy = chain.blocks[1].clone();
        let report = chain.push_block(copy).verify();
        assert_eq!(report.violation.unwrap().kind, ViolationKind::RepeatedState);
        assert_eq!(report.block_count, 3);
    }

    #[test]
    fn after_terminal_outranks_unknown_state() {
        let chain = ChainBuilder::new()
            .push(1, CheckedIn, b"")
            .push(1, Disposed, b"");
        let mut forged = Block::new(chain.tip(), 9.0, Uuid::from_u128(CASE), 1, CheckedIn, vec![]);
        forged.header.state = state_field("MISPLACED").unwrap();
        let report = chain.push_block(forged).verify();
        let violation = report.violation.unwrap();
        assert_eq!(violation.kind, ViolationKind::AfterTerminal);
        assert_eq!(violation.position, 3);
    }

    #[test]
    fn truncated_record_is_an_error_not_a_violation() {
        let chain = ChainBuilder::new().push(1, CheckedIn, b"");
        let mut bytes = chain.ledger().into_backend().into_bytes();
        bytes.truncate(bytes.len() - 5);
        let ledger = Ledger::with_backend(MemoryBackend::from_bytes(bytes));
        assert!(matches!(
            verify(&ledger),
            Err(crate::error::LedgerError::CorruptLedger { .. })
        ));
    }

    #[test]
    fn verify_does_not_mutate() {
        let chain = ChainBuilder::new().push(1, CheckedIn, b"");
        let ledger = chain.ledger();
        let before = ledger.backend().as_bytes().to_vec();
        verify(&ledger).unwrap();
        assert_eq!(ledger.backend().as_bytes(), before.as_slice());
    }

    #[test]
    fn report_serializes_for_machine_consumers() {
        let report = ChainBuilder::new()
            .push(1, CheckedIn, b"")
            .push(1, CheckedIn, b"")
            .verify();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["violation"]["kind"], "repeated_state");
        assert_eq!(json["block_count"], 3);
    }
}
