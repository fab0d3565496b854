//! Amount representation
//!
//! Balances are whole units held in a `u64`; a balance can never be negative
//! by construction. Aggregates over many accounts are widened to `u128`.

/// Amount of value held by or moved for a single account.
pub type Amount = u64;

/// Sum of many `Amount`s.
pub type Total = u128;
