//! Ledgerlink Client - The ledger RPC capability seam
//!
//! The adapter never talks to a node directly; everything it needs from
//! the ledger is behind [`LedgerRpcClient`]: submit a contract
//! transaction, poll for a receipt, subscribe to contract events, make a
//! read-only call, read a balance. Transports and contract ABI encoding
//! live behind implementations of this trait.
//!
//! [`memory::InMemoryLedger`] implements the trait for tests and demos.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use ledgerlink_types::{Amount, Result};

/// Handle of a submitted ledger transaction (the transaction hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHandle(pub String);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receipt reported by the ledger once a transaction is mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHandle,
    pub block_number: Option<u64>,
    /// Execution status when the node reports one. `None` when the
    /// transport cannot distinguish success from revert; receipt presence
    /// alone does not imply the transaction took effect.
    pub status: Option<bool>,
}

/// A contract method invocation submitted as a transaction.
///
/// Arguments are already in their on-chain textual forms; the ABI layer
/// behind the client turns them into calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub method: String,
    pub args: Vec<String>,
    pub sender: String,
    /// Payment value carried by the transaction, in base units
    pub value: Amount,
    pub gas: u64,
}

/// Contract event kinds this adapter subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerEventKind {
    /// A transfer changed on-ledger state
    Update,
    /// A transfer was fulfilled; carries the preimage
    Fulfill,
    /// Contract-side diagnostics, logged and never reconciled
    Debug,
}

impl LedgerEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "Update",
            Self::Fulfill => "Fulfill",
            Self::Debug => "Debug",
        }
    }
}

impl fmt::Display for LedgerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw contract event as delivered by the ledger client.
///
/// The payload identifies the transfer but does not carry the full
/// transfer data; reconciliation fetches the tuple and memo separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Update {
        /// 0x-prefixed 16-byte transfer id
        transfer_id: String,
    },
    Fulfill {
        /// 0x-prefixed 16-byte transfer id
        transfer_id: String,
        /// 0x-prefixed preimage bytes
        fulfillment: String,
    },
    Debug {
        message: String,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> LedgerEventKind {
        match self {
            Self::Update { .. } => LedgerEventKind::Update,
            Self::Fulfill { .. } => LedgerEventKind::Fulfill,
            Self::Debug { .. } => LedgerEventKind::Debug,
        }
    }
}

/// Stream of error-or-event items from a contract event subscription.
pub type EventStream = BoxStream<'static, Result<LedgerEvent>>;

/// The ledger node capability this adapter is built on.
#[async_trait]
pub trait LedgerRpcClient: Send + Sync {
    /// Submit a contract transaction; resolves with its handle as soon as
    /// the node accepts it, well before it is mined.
    async fn submit_transaction(&self, call: ContractCall) -> Result<TxHandle>;

    /// Receipt for a submitted transaction, or `None` while unmined.
    async fn transaction_receipt(&self, handle: &TxHandle) -> Result<Option<Receipt>>;

    /// Subscribe to a contract event; the stream lives until the client
    /// connection lapses.
    async fn subscribe(&self, kind: LedgerEventKind) -> Result<EventStream>;

    /// Read-only contract call returning the stringified result tuple.
    async fn call(&self, method: &str, args: &[String]) -> Result<Vec<String>>;

    /// Ledger balance of an address, in base units.
    async fn balance(&self, address: &str) -> Result<Amount>;
}
