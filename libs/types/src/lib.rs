//! Types library for the custodial ledger
//!
//! # Modules
//! - `ids`: Unique identifiers (AccountId)
//! - `numeric`: Amount types

pub mod ids;
pub mod numeric;
