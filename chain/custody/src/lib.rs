//! Custodial Ledger with Reentrancy Protection
//!
//! Holds per-account balances, accepts deposits, and pays withdrawals out
//! through an untrusted [`gateway::TransferGateway`] that may call back into
//! the ledger before the withdrawal has returned.
//!
//! # Modules
//! - `errors`: Ledger, transfer, and configuration error types
//! - `events`: `Deposited` / `Withdrawn` notifications
//! - `security`: Exclusive-entry reentrancy guard
//! - `gateway`: Transfer channel contract and stock implementations
//! - `notify`: Notification sinks (in-memory log, tracing)
//! - `config`: Ledger configuration
//! - `ledger`: Balance ledger with checks-effects-interactions withdrawals

pub mod config;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod ledger;
pub mod notify;
pub mod security;

pub use config::LedgerConfig;
pub use errors::{ConfigError, LedgerError, TransferError};
pub use events::{Deposited, LedgerEvent, Withdrawn};
pub use gateway::{RecordingGateway, RejectingGateway, TransferGateway};
pub use ledger::{Ledger, SolvencyReport};
pub use notify::{EventLog, NotificationSink, TracingSink};
pub use security::{EntryToken, GuardState, ReentrancyGuard};
