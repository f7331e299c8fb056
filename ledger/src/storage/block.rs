//! # Block Structure & Codec
//!
//! A block is one immutable custody record: a fixed 68-byte header followed
//! by a variable-length payload. Blocks are never rewritten once appended;
//! each one names its predecessor by the SHA-1 digest of the predecessor's
//! full encoded bytes.
//!
//! ## Block Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  BlockHeader                               68 bytes  │
//! │  ├── previous_digest: [u8; 20]   @0                  │
//! │  ├── (alignment)                 @20  4 zero bytes   │
//! │  ├── timestamp: f64 LE           @24                 │
//! │  ├── case_id: u128 LE            @32                 │
//! │  ├── evidence_id: u32 LE         @48                 │
//! │  ├── state: [u8; 11] ASCII/NUL   @52                 │
//! │  ├── (alignment)                 @63  1 zero byte    │
//! │  └── payload_length: u32 LE      @64                 │
//! ├──────────────────────────────────────────────────────┤
//! │  payload: [u8; payload_length]                       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Strict vs. lenient decoding
//!
//! [`decode`] is strict: the state field must name a known custody state.
//! The store frames records with [`decode_header`], which never looks at
//! the state, so the verifier can report an unknown state as an integrity
//! violation instead of giving up on the whole file.

use uuid::Uuid;

use crate::config::{
    DIGEST_LENGTH, GENESIS_EVIDENCE_ID, GENESIS_PAYLOAD, HEADER_LENGTH, STATE_FIELD_LENGTH,
};
use crate::crypto::{chain_digest, BlockDigest};
use crate::custody::CustodyState;
use crate::error::CodecError;

const TIMESTAMP_OFFSET: usize = 24;
const CASE_ID_OFFSET: usize = 32;
const EVIDENCE_ID_OFFSET: usize = 48;
const STATE_OFFSET: usize = 52;
const PAYLOAD_LENGTH_OFFSET: usize = 64;

// ---------------------------------------------------------------------------
// BlockHeader
// ---------------------------------------------------------------------------

/// The fixed-size part of a block.
///
/// `state` is the raw field as stored. Use [`BlockHeader::custody_state`] for
/// the typed value.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockHeader {
    /// Chain digest of the preceding block. All zeros for genesis.
    pub previous_digest: BlockDigest,
    /// Seconds since the Unix epoch, UTC, taken when the block was appended.
    pub timestamp: f64,
    /// Case the item belongs to. Nil for genesis.
    pub case_id: Uuid,
    /// Evidence item this block records.
    pub evidence_id: u32,
    /// NUL-padded ASCII state name.
    pub state: [u8; STATE_FIELD_LENGTH],
    /// Declared payload size in bytes.
    pub payload_length: u32,
}

impl BlockHeader {
    /// The typed custody state.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownState`] if the field is not an enumerated state.
    pub fn custody_state(&self) -> Result<CustodyState, CodecError> {
        CustodyState::from_field(&self.state)
            .ok_or_else(|| CodecError::UnknownState(self.state_label()))
    }

    /// The state field as text with padding removed, for reports.
    pub fn state_label(&self) -> String {
        String::from_utf8_lossy(&self.state)
            .trim_end_matches('\0')
            .to_string()
    }

    /// Serialize the header alone.
    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut out = [0u8; HEADER_LENGTH];
        out[..DIGEST_LENGTH].copy_from_slice(self.previous_digest.as_bytes());
        out[TIMESTAMP_OFFSET..CASE_ID_OFFSET].copy_from_slice(&self.timestamp.to_le_bytes());
        out[CASE_ID_OFFSET..EVIDENCE_ID_OFFSET]
            .copy_from_slice(&self.case_id.as_u128().to_le_bytes());
        out[EVIDENCE_ID_OFFSET..STATE_OFFSET].copy_from_slice(&self.evidence_id.to_le_bytes());
        out[STATE_OFFSET..STATE_OFFSET + STATE_FIELD_LENGTH].copy_from_slice(&self.state);
        out[PAYLOAD_LENGTH_OFFSET..].copy_from_slice(&self.payload_length.to_le_bytes());
        out
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A full custody record: header plus payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    /// Genesis marker, releasing owner, or empty.
    pub payload: Vec<u8>,
}

impl Block {
    /// Construct a block; `payload_length` is taken from `payload`.
    pub fn new(
        previous_digest: BlockDigest,
        timestamp: f64,
        case_id: Uuid,
        evidence_id: u32,
        state: CustodyState,
        payload: Vec<u8>,
    ) -> Self {
        // An oversized payload gets a length that cannot match, so encode()
        // reports it instead of silently truncating.
        let payload_length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        Block {
            header: BlockHeader {
                previous_digest,
                timestamp,
                case_id,
                evidence_id,
                state: state.to_field(),
                payload_length,
            },
            payload,
        }
    }

    /// The genesis block: no parent, nil case, item 0, state INITIAL.
    pub fn genesis(timestamp: f64) -> Self {
        Self::new(
            BlockDigest::ZERO,
            timestamp,
            Uuid::nil(),
            GENESIS_EVIDENCE_ID,
            CustodyState::Initial,
            GENESIS_PAYLOAD.to_vec(),
        )
    }

    /// Shorthand for [`BlockHeader::custody_state`].
    pub fn state(&self) -> Result<CustodyState, CodecError> {
        self.header.custody_state()
    }

    pub fn evidence_id(&self) -> u32 {
        self.header.evidence_id
    }

    pub fn case_id(&self) -> Uuid {
        self.header.case_id
    }

    /// Whether this block has the shape of a genesis block.
    pub fn is_genesis(&self) -> bool {
        self.header.previous_digest.is_zero()
            && self.header.case_id.is_nil()
            && self.header.evidence_id == GENESIS_EVIDENCE_ID
            && matches!(self.state(), Ok(CustodyState::Initial))
    }

    /// Payload as text, trailing NUL padding removed.
    ///
    /// Older writers NUL-terminate owner strings; this hides the difference.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload)
            .trim_end_matches('\0')
            .to_string()
    }

    /// Header followed by payload, exactly as stored.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        encode(self)
    }

    /// Chain digest over [`Block::encode`].
    pub fn digest(&self) -> Result<BlockDigest, CodecError> {
        Ok(chain_digest(&self.encode()?))
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Serialize a block.
///
/// # Errors
///
/// [`CodecError::Encoding`] if `payload_length` disagrees with the payload.
pub fn encode(block: &Block) -> Result<Vec<u8>, CodecError> {
    if block.header.payload_length as usize != block.payload.len()
        || block.payload.len() > u32::MAX as usize
    {
        return Err(CodecError::Encoding(format!(
            "payload_length is {} but payload has {} bytes",
            block.header.payload_length,
            block.payload.len()
        )));
    }
    let mut out = Vec::with_capacity(HEADER_LENGTH + block.payload.len());
    out.extend_from_slice(&block.header.to_bytes());
    out.extend_from_slice(&block.payload);
    Ok(out)
}

/// Parse a header without validating the state field.
pub fn decode_header(bytes: &[u8; HEADER_LENGTH]) -> BlockHeader {
    let mut previous = [0u8; DIGEST_LENGTH];
    previous.copy_from_slice(&bytes[..DIGEST_LENGTH]);
    let mut state = [0u8; STATE_FIELD_LENGTH];
    state.copy_from_slice(&bytes[STATE_OFFSET..STATE_OFFSET + STATE_FIELD_LENGTH]);

    BlockHeader {
        previous_digest: BlockDigest::from_bytes(previous),
        timestamp: f64::from_le_bytes(array_at(bytes, TIMESTAMP_OFFSET)),
        case_id: Uuid::from_u128(u128::from_le_bytes(array_at(bytes, CASE_ID_OFFSET))),
        evidence_id: u32::from_le_bytes(array_at(bytes, EVIDENCE_ID_OFFSET)),
        state,
        payload_length: u32::from_le_bytes(array_at(bytes, PAYLOAD_LENGTH_OFFSET)),
    }
}

/// Parse one record from the front of `bytes` without validating the state
/// field. Returns the block and the number of bytes it occupied.
pub fn decode_prefix(bytes: &[u8]) -> Result<(Block, usize), CodecError> {
    let header_bytes: &[u8; HEADER_LENGTH] = bytes
        .get(..HEADER_LENGTH)
        .and_then(|h| h.try_into().ok())
        .ok_or(CodecError::Truncated {
            needed: HEADER_LENGTH,
            available: bytes.len(),
        })?;
    let header = decode_header(header_bytes);
    let total = HEADER_LENGTH + header.payload_length as usize;
    let payload = bytes
        .get(HEADER_LENGTH..total)
        .ok_or(CodecError::Truncated {
            needed: total,
            available: bytes.len(),
        })?
        .to_vec();
    Ok((Block { header, payload }, total))
}

/// Parse exactly one encoded block.
///
/// # Errors
///
/// [`CodecError::Truncated`] or [`CodecError::TrailingBytes`] when the input
/// is not exactly one record; [`CodecError::UnknownState`] when the state
/// field does not name a custody state.
pub fn decode(bytes: &[u8]) -> Result<Block, CodecError> {
    let (block, used) = decode_prefix(bytes)?;
    if used != bytes.len() {
        return Err(CodecError::TrailingBytes(bytes.len() - used));
    }
    block.state()?;
    Ok(block)
}

/// Build a state field from arbitrary text.
///
/// Only needed for tooling that has to write states outside the enumerated
/// set (fixtures, migrations); normal blocks use [`CustodyState::to_field`].
pub fn state_field(label: &str) -> Result<[u8; STATE_FIELD_LENGTH], CodecError> {
    if !label.is_ascii() || label.len() > STATE_FIELD_LENGTH {
        return Err(CodecError::Encoding(format!(
            "state {label:?} does not fit a {STATE_FIELD_LENGTH}-byte ASCII field"
        )));
    }
    let mut field = [0u8; STATE_FIELD_LENGTH];
    field[..label.len()].copy_from_slice(label.as_bytes());
    Ok(field)
}

fn array_at<const N: usize>(bytes: &[u8; HEADER_LENGTH], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
