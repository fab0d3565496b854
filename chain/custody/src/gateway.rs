//! Transfer gateway contract
//!
//! The gateway is the outbound channel used by a withdrawal's interaction
//! step. It may run arbitrary logic belonging to the receiver, including
//! calls straight back into the ledger, before it returns.

use std::cell::RefCell;
use std::fmt;

use types::ids::AccountId;
use types::numeric::{Amount, Total};

use crate::errors::TransferError;

/// Capability to deliver value to an account owner.
///
/// Implementations must deliver all of `amount` or report an error; partial
/// delivery is not allowed. An error means nothing was delivered.
pub trait TransferGateway {
    fn send(&self, account_id: AccountId, amount: Amount) -> Result<(), TransferError>;
}

impl fmt::Debug for dyn TransferGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn TransferGateway")
    }
}

/// Gateway that accepts every transfer and remembers it.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    deliveries: RefCell<Vec<(AccountId, Amount)>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries in the order they were made.
    pub fn deliveries(&self) -> Vec<(AccountId, Amount)> {
        self.deliveries.borrow().clone()
    }

    /// Sum of everything delivered, optionally filtered to one account.
    pub fn total_delivered(&self, account_id: Option<&AccountId>) -> Total {
        self.deliveries
            .borrow()
            .iter()
            .filter(|(id, _)| account_id.map_or(true, |a| a == id))
            .map(|(_, amount)| Total::from(*amount))
            .sum()
    }
}

impl TransferGateway for RecordingGateway {
    fn send(&self, account_id: AccountId, amount: Amount) -> Result<(), TransferError> {
        self.deliveries.borrow_mut().push((account_id, amount));
        Ok(())
    }
}

/// Gateway that fails every transfer with a fixed error.
#[derive(Debug, Clone)]
pub struct RejectingGateway {
    error: TransferError,
}

impl RejectingGateway {
    pub fn new(error: TransferError) -> Self {
        Self { error }
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self::new(TransferError::Rejected {
            reason: reason.into(),
        })
    }
}

impl Default for RejectingGateway {
    fn default() -> Self {
        Self::new(TransferError::Unavailable)
    }
}

impl TransferGateway for RejectingGateway {
    fn send(&self, _account_id: AccountId, _amount: Amount) -> Result<(), TransferError> {
        Err(self.error.clone())
    }
}
