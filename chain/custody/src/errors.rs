//! Ledger error types
//!
//! Every failure is terminal for the call that raised it. None of them leave
//! the ledger mutated or the reentrancy guard entered.

use thiserror::Error;
use types::ids::AccountId;
use types::numeric::Amount;

/// Errors surfaced by ledger entry points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero or exceeds the account balance.
    #[error("Insufficient funds in {account_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        account_id: AccountId,
        requested: Amount,
        available: Amount,
    },

    /// The gateway reported failure; the debit has been rolled back.
    #[error("Transfer of {amount} to {account_id} failed: {source}")]
    TransferFailed {
        account_id: AccountId,
        amount: Amount,
        #[source]
        source: TransferError,
    },

    #[error("Reentrant call rejected: {operation} invoked while a guarded operation is in progress")]
    ReentrancyRejected { operation: &'static str },

    #[error("Balance overflow for {account_id}: {balance} + {amount} exceeds cap {cap}")]
    BalanceOverflow {
        account_id: AccountId,
        balance: Amount,
        amount: Amount,
        cap: Amount,
    },
}

/// Failure reported by a transfer gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("rejected by receiver: {reason}")]
    Rejected { reason: String },

    #[error("transfer channel unavailable")]
    Unavailable,
}

/// Configuration loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("Malformed config: {0}")]
    Parse(String),

    #[error("balance_cap must be positive")]
    InvalidBalanceCap,
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
