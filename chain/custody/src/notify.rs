//! Notification sinks
//!
//! Sinks are fire-and-forget: `notify` returns nothing and a sink has no way
//! to fail or roll back the operation that produced the event.

use std::cell::RefCell;
use std::fmt;

use tracing::info;

use crate::events::LedgerEvent;

/// Consumer of committed ledger events.
pub trait NotificationSink {
    fn notify(&self, event: &LedgerEvent);
}

impl fmt::Debug for dyn NotificationSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn NotificationSink")
    }
}

/// Append-only in-memory event log.
#[derive(Debug, Default)]
pub struct EventLog {
    events: RefCell<Vec<LedgerEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Drain all events (consume and clear).
    pub fn drain(&self) -> Vec<LedgerEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl NotificationSink for EventLog {
    fn notify(&self, event: &LedgerEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Forwards events to `tracing` under the `custody::events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Deposited(e) => {
                info!(target: "custody::events", account_id = %e.account_id, amount = e.amount, "Deposited")
            }
            LedgerEvent::Withdrawn(e) => {
                info!(target: "custody::events", account_id = %e.account_id, amount = e.amount, "Withdrawn")
            }
        }
    }
}
