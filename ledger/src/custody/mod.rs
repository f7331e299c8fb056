//! # Custody Model
//!
//! The states an evidence item moves through and the rules for moving
//! between them. Pure data and pure functions; the ledger store and the
//! command engine build on top of this.

pub mod machine;
pub mod state;

pub use machine::{transition, Action, TransitionError};
pub use state::{CustodyState, RemovalReason};
