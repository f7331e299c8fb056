//! The custody state machine.
//!
//! A pure function over `(current state, requested action)`. It knows nothing
//! about storage, digests or owners; callers look up the item's last state,
//! ask [`transition`] what the next one is, and only then touch the ledger.
//!
//! ```text
//!             add                checkout
//!   (none) ───────▶ CHECKEDIN ─────────────▶ CHECKEDOUT
//!                      ▲   │ ◀──────────────     │
//!                      │   │     checkin         │
//!                      │   └─▶ remove(reason) ─▶ DISPOSED | DESTROYED | RELEASED
//! ```

use std::fmt;

use thiserror::Error;

use super::state::{CustodyState, RemovalReason};

/// A custody operation requested against one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Checkout,
    Checkin,
    Remove(RemovalReason),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Checkout => f.write_str("checkout"),
            Self::Checkin => f.write_str("checkin"),
            Self::Remove(reason) => write!(f, "remove({reason})"),
        }
    }
}

/// The requested action is not allowed from the item's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} an item that is {}", describe(.from))]
pub struct TransitionError {
    /// The item's state before the request; `None` if it has no blocks.
    pub from: Option<CustodyState>,
    /// What was asked for.
    pub action: Action,
}

fn describe(state: &Option<CustodyState>) -> String {
    match state {
        Some(state) => state.to_string(),
        None => "not in the ledger".to_string(),
    }
}

/// Validate `action` against `current` and return the resulting state.
///
/// # Errors
///
/// Returns [`TransitionError`] for every pair not listed below:
///
/// | current      | action           | result        |
/// |--------------|------------------|---------------|
/// | none         | add              | CHECKEDIN     |
/// | CHECKEDIN    | checkout         | CHECKEDOUT    |
/// | CHECKEDOUT   | checkin          | CHECKEDIN     |
/// | CHECKEDIN    | remove(reason)   | reason's state|
pub fn transition(
    current: Option<CustodyState>,
    action: Action,
) -> Result<CustodyState, TransitionError> {
    use CustodyState::*;

    match (current, action) {
        (None, Action::Add) => Ok(CheckedIn),
        (Some(CheckedIn), Action::Checkout) => Ok(CheckedOut),
        (Some(CheckedOut), Action::Checkin) => Ok(CheckedIn),
        (Some(CheckedIn), Action::Remove(reason)) => Ok(reason.terminal_state()),
        (from, action) => Err(TransitionError { from, action }),
    }
}
