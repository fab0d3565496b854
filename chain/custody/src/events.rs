//! Ledger notifications
//!
//! Immutable records handed to the notification sink after a guarded
//! operation has committed.

use serde::{Deserialize, Serialize};
use types::ids::AccountId;
use types::numeric::Amount;

/// Funds credited to an account. Zero-amount deposits are still reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub account_id: AccountId,
    pub amount: Amount,
}

/// Funds delivered to an account owner through the transfer gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub account_id: AccountId,
    pub amount: Amount,
}

/// Enum wrapper for all ledger events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Deposited(Deposited),
    Withdrawn(Withdrawn),
}

impl LedgerEvent {
    pub fn account_id(&self) -> AccountId {
        match self {
            LedgerEvent::Deposited(e) => e.account_id,
            LedgerEvent::Withdrawn(e) => e.account_id,
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            LedgerEvent::Deposited(e) => e.amount,
            LedgerEvent::Withdrawn(e) => e.amount,
        }
    }
}
