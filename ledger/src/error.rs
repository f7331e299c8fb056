//! Error types for the custody ledger.
//!
//! Every fallible ledger operation returns a [`LedgerError`]. The variants are
//! exhaustive over the failure kinds a caller has to tell apart; integrity
//! violations found by the verifier are not errors and are reported through
//! [`crate::verifier::ChainReport`] instead.

use thiserror::Error;

use crate::custody::TransitionError;

/// Failures of the block codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A block could not be serialized (length mismatch, oversized field).
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Fewer bytes were available than the record needs.
    #[error("truncated block: needed {needed} bytes, found {available}")]
    Truncated {
        /// Bytes the record declares.
        needed: usize,
        /// Bytes actually present.
        available: usize,
    },

    /// Bytes were left over after a complete record.
    #[error("{0} trailing bytes after block")]
    TrailingBytes(usize),

    /// The state field is not one of the enumerated custody states.
    #[error("unknown custody state {0:?}")]
    UnknownState(String),
}

/// Errors surfaced by the ledger store and the command engine.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or missing command arguments. Nothing was written.
    #[error("invalid input: {0}")]
    Input(String),

    /// `add` named an evidence id that already appears in the chain.
    #[error("evidence item {0} already exists in the ledger")]
    DuplicateItem(u32),

    /// The item's current state does not allow the requested action.
    #[error("illegal transition for item {item}: {source}")]
    IllegalTransition {
        /// Evidence id the request targeted.
        item: u32,
        /// What the state machine rejected.
        #[source]
        source: TransitionError,
    },

    /// Reading or writing the ledger failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// The ledger bytes are not a well-formed chain.
    #[error("corrupt ledger at byte {offset}: {reason}")]
    CorruptLedger {
        /// Byte offset of the offending record.
        offset: u64,
        /// What is wrong with it.
        reason: String,
    },

    /// A block built by the engine could not be encoded.
    #[error("failed to encode block: {0}")]
    Encoding(CodecError),
}

impl LedgerError {
    /// Stable name of the error kind, for reports and exit messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "InputError",
            Self::DuplicateItem(_) => "DuplicateItemError",
            Self::IllegalTransition { .. } => "IllegalTransitionError",
            Self::Storage(_) => "StorageError",
            Self::CorruptLedger { .. } => "CorruptLedgerError",
            Self::Encoding(_) => "EncodingError",
        }
    }

    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptLedger {
            offset,
            reason: reason.into(),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
