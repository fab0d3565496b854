//! Exclusive-entry reentrancy guard
//!
//! Guarded operations take `&self` so that an external call made mid-flight
//! can reach the ledger again. The guard flag therefore lives in a `Cell`,
//! and entry hands out an [`EntryToken`] whose `Drop` resets the flag on
//! every exit path: normal return, `?` early return, or unwinding.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Guard state for one call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GuardState {
    #[default]
    Idle,
    Entered,
}

/// Reentrancy guard preventing nested calls into protected functions.
///
/// A ledger operation enters the guard before touching balances. Any nested
/// attempt to enter while the token is alive is refused.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    state: Cell<GuardState>,
}

impl ReentrancyGuard {
    /// Create a new idle guard.
    pub fn new() -> Self {
        Self {
            state: Cell::new(GuardState::Idle),
        }
    }

    /// Enter the guard. Returns `None` if already entered (reentrancy attempt).
    #[must_use = "the guard is released as soon as the token is dropped"]
    pub fn enter(&self) -> Option<EntryToken<'_>> {
        if self.state.get() == GuardState::Entered {
            return None;
        }
        self.state.set(GuardState::Entered);
        Some(EntryToken { guard: self })
    }

    pub fn state(&self) -> GuardState {
        self.state.get()
    }

    pub fn is_entered(&self) -> bool {
        self.state.get() == GuardState::Entered
    }
}

/// Proof of exclusive entry. Releases the guard when dropped.
#[derive(Debug)]
pub struct EntryToken<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for EntryToken<'_> {
    fn drop(&mut self) {
        self.guard.state.set(GuardState::Idle);
    }
}
