//! Custody states and removal reasons.
//!
//! These are the values the 11-byte state field of a block may hold. The
//! on-disk spelling is the upper-case ASCII name, NUL-padded to the full
//! field width.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::STATE_FIELD_LENGTH;

// ---------------------------------------------------------------------------
// CustodyState
// ---------------------------------------------------------------------------

/// Where an evidence item currently stands.
///
/// `Initial` only ever appears on the genesis block. `Disposed`, `Destroyed`
/// and `Released` are terminal: nothing may follow them for the same item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CustodyState {
    /// Genesis marker.
    Initial,
    /// In the evidence room.
    CheckedIn,
    /// Out with an investigator.
    CheckedOut,
    /// Disposed of; terminal.
    Disposed,
    /// Destroyed; terminal.
    Destroyed,
    /// Released to its lawful owner; terminal.
    Released,
}

impl CustodyState {
    /// Every state, in declaration order.
    pub const ALL: [CustodyState; 6] = [
        Self::Initial,
        Self::CheckedIn,
        Self::CheckedOut,
        Self::Disposed,
        Self::Destroyed,
        Self::Released,
    ];

    /// The ASCII name written into the state field.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::CheckedIn => "CHECKEDIN",
            Self::CheckedOut => "CHECKEDOUT",
            Self::Disposed => "DISPOSED",
            Self::Destroyed => "DESTROYED",
            Self::Released => "RELEASED",
        }
    }

    /// True once no further block may be appended for the item.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Disposed | Self::Destroyed | Self::Released)
    }

    /// The NUL-padded field as stored in a block header.
    pub fn to_field(&self) -> [u8; STATE_FIELD_LENGTH] {
        let mut field = [0u8; STATE_FIELD_LENGTH];
        let name = self.as_str().as_bytes();
        field[..name.len()].copy_from_slice(name);
        field
    }

    /// Parse a stored state field.
    ///
    /// Trailing NUL padding is stripped and the remainder must equal one of
    /// the names exactly; anything else (garbage after the padding, lower
    /// case, a truncated name) is `None`.
    pub fn from_field(field: &[u8]) -> Option<Self> {
        let end = field
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        let name = &field[..end];
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().as_bytes() == name)
    }
}

impl fmt::Display for CustodyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustodyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown custody state: {s}"))
    }
}

// ---------------------------------------------------------------------------
// RemovalReason
// ---------------------------------------------------------------------------

/// Why an item leaves custody for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemovalReason {
    Disposed,
    Destroyed,
    /// Requires the receiving owner's identity.
    Released,
}

impl RemovalReason {
    /// The terminal state this reason produces.
    pub const fn terminal_state(&self) -> CustodyState {
        match self {
            Self::Disposed => CustodyState::Disposed,
            Self::Destroyed => CustodyState::Destroyed,
            Self::Released => CustodyState::Released,
        }
    }

    /// Whether the removal must name an owner.
    pub const fn requires_owner(&self) -> bool {
        matches!(self, Self::Released)
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.terminal_state().as_str())
    }
}

impl FromStr for RemovalReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DISPOSED" => Ok(Self::Disposed),
            "DESTROYED" => Ok(Self::Destroyed),
            "RELEASED" => Ok(Self::Released),
            other => Err(format!(
                "invalid removal reason: {other} (expected DISPOSED, DESTROYED or RELEASED)"
            )),
        }
    }
}
