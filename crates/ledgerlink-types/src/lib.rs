//! Ledgerlink Types - Canonical domain types for the contract-ledger adapter
//!
//! This crate contains the foundational types for ledgerlink with zero
//! dependencies on other ledgerlink crates. It defines:
//!
//! - Transfer identity and party types (`TransferId`, `Account`)
//! - Exact base-unit amounts (`Amount`)
//! - Condition digests and fulfillment preimages
//! - The transfer lifecycle state machine (`TransferState`, `Direction`)
//! - Ledger profile and construction-time configuration
//! - The error taxonomy shared by every layer
//!
//! # Invariants
//!
//! 1. Transfer ids are globally unique (ledger-enforced)
//! 2. Amount, condition and expiry are immutable once a transfer exists
//! 3. `prepare` is the only initial state; fulfill/cancel/reject are terminal
//! 4. Direction is derived from the local account, never stored on-ledger

pub mod amount;
pub mod error;
pub mod profile;
pub mod transfer;

pub use amount::*;
pub use error::*;
pub use profile::*;
pub use transfer::*;
