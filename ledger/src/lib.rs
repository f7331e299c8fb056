// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # bchoc: Evidence Chain-of-Custody Ledger
//!
//! An append-only, hash-linked ledger that records every custody event for
//! physical evidence items: checked in, checked out, and finally disposed of,
//! destroyed, or released to an owner. Each block names its parent by the
//! SHA-1 digest of the parent's stored bytes, so any edit to history breaks
//! the chain in a way [`verifier::verify`] can point at.
//!
//! ## Architecture
//!
//! - **config**: Wire constants and the ledger location.
//! - **crypto**: The chain digest.
//! - **custody**: Custody states and the transition table.
//! - **storage**: Block codec, byte backends, and the ledger store.
//! - **engine**: The custody commands: init, add, checkout, checkin,
//!   remove, log, verify.
//! - **verifier**: Full-chain integrity check.
//! - **clock**: Where block timestamps come from.
//!
//! ## Example
//!
//! ```
//! use bchoc_ledger::{CustodyEngine, FixedClock, LogQuery, RemovalReason};
//! use uuid::Uuid;
//!
//! let mut engine = CustodyEngine::in_memory(FixedClock::stepping(1.7e9, 1.0));
//! let case = Uuid::from_u128(0x65cc391d65684dcca3f186a2f04140f3);
//!
//! engine.add(case, &[1, 2])?;
//! engine.checkout(1)?;
//! engine.checkin(1)?;
//! engine.remove(1, RemovalReason::Released, Some("Jane Roe"))?;
//!
//! assert!(engine.verify()?.is_clean());
//! assert_eq!(engine.log(&LogQuery::default())?.entries.len(), 6);
//! # Ok::<(), bchoc_ledger::LedgerError>(())
//! ```

pub mod clock;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod engine;
pub mod error;
pub mod storage;
pub mod verifier;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::LedgerConfig;
pub use crypto::{chain_digest, BlockDigest};
pub use custody::{transition, Action, CustodyState, RemovalReason, TransitionError};
pub use engine::{AddReceipt, CustodyEngine, InitReport, LogEntry, LogQuery, LogReport};
pub use error::{CodecError, LedgerError, LedgerResult};
pub use storage::{Block, ChainEntry, FileBackend, Ledger, LedgerBackend, MemoryBackend};
pub use verifier::{ChainReport, Violation, ViolationKind};
