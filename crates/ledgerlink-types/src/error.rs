//! Error types for ledgerlink
//!
//! Caller-invoked operations propagate these to the caller; background
//! event and polling loops contain them locally and never crash.

use thiserror::Error;

/// Result type for ledgerlink operations
pub type Result<T> = std::result::Result<T, PluginError>;

/// Ledgerlink error types
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// Operation requires an active ledger client
    #[error("not connected to the ledger")]
    NotConnected,

    /// Codec input outside its valid domain; fatal to the single
    /// operation, not to the process
    #[error("malformed {what}: {reason}")]
    MalformedEncoding { what: String, reason: String },

    /// Transport or contract-call failure reported by the ledger client
    #[error("ledger rpc failure: {message}")]
    LedgerRpc { message: String },

    /// On-chain data that cannot map into the canonical model, such as an
    /// unknown state ordinal
    #[error("unrecoverable decode of {what}: {value:?}")]
    UnrecoverableDecode { what: String, value: String },

    /// Bounded confirmation wait elapsed before a receipt appeared
    #[error("no receipt for transaction {tx_hash} within the deadline")]
    ReceiptTimeout { tx_hash: String },
}

impl PluginError {
    /// Create a malformed-encoding error
    pub fn malformed(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEncoding {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Create a ledger RPC error
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::LedgerRpc {
            message: message.into(),
        }
    }

    /// Create an unrecoverable-decode error
    pub fn undecodable(what: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnrecoverableDecode {
            what: what.into(),
            value: value.into(),
        }
    }
}
