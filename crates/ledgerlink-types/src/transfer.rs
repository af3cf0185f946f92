//! Canonical transfer types
//!
//! `Transfer` is the record this adapter reconciles between the on-chain
//! representation and the routing layer's textual protocol forms. Field
//! names serialize in the routing protocol's camelCase.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, PluginError, Result};

/// Globally unique transfer identifier.
///
/// Textual UUID form off-ledger, raw 16 bytes on-ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(Uuid);

impl TransferId {
    /// Create a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| PluginError::malformed("transfer id", e.to_string()))
    }
}

/// Ledger-scoped account identifier in `<namespace>.<ledger-kind>.<address>`
/// form, with the address component lowercased.
///
/// Construction from a raw address goes through the codec so the profile
/// prefix and normalization are applied in one place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(inner: impl Into<String>) -> Self {
        Self(inner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw execution-condition digest as carried on-ledger.
///
/// Length is profile-defined (32 bytes for the Ethereum profile); the
/// codec validates it on every boundary crossing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition(Vec<u8>);

impl Condition {
    pub fn new(digest: Vec<u8>) -> Self {
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fulfillment preimage; a ledger-defined hash of it equals the transfer's
/// condition digest. Verification is the contract's job, not ours.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fulfillment(Vec<u8>);

impl Fulfillment {
    pub fn new(preimage: Vec<u8>) -> Self {
        Self(preimage)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Lifecycle state of a conditional transfer.
///
/// `Prepare` is the only initial state; the other three are terminal and
/// no transition leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Prepare,
    Fulfill,
    Cancel,
    Reject,
}

impl TransferState {
    /// Map an on-chain state ordinal; `None` for unknown ordinals
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Prepare),
            1 => Some(Self::Fulfill),
            2 => Some(Self::Cancel),
            3 => Some(Self::Reject),
            _ => None,
        }
    }

    /// The on-chain state ordinal
    pub fn code(self) -> u8 {
        match self {
            Self::Prepare => 0,
            Self::Fulfill => 1,
            Self::Cancel => 2,
            Self::Reject => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Fulfill => "fulfill",
            Self::Cancel => "cancel",
            Self::Reject => "reject",
        }
    }

    /// Fulfill, cancel and reject are terminal
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Prepare)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the local account is the sender or receiver of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical record of a conditional payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: TransferId,
    pub from: Account,
    pub to: Account,
    /// Exact base units; decimal text conversion is a codec concern
    pub amount: Amount,
    /// Opaque application payload decoded from the on-chain memo;
    /// an empty object when the memo is missing or undecodable
    #[serde(default)]
    pub data: serde_json::Value,
    /// Self-describing condition string, `cc:<type>:<suite>:<base64url>:<len>`
    pub execution_condition: String,
    pub expires_at: DateTime<Utc>,
    pub state: TransferState,
    /// Local-only metadata, never sent to the ledger; present only for
    /// outgoing transfers created by this process instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_to_self: Option<serde_json::Value>,
}

impl Transfer {
    /// Direction of this transfer relative to `local`, or `None` when the
    /// local account is neither party (such a record is dropped, not
    /// notified). A self-transfer reports as incoming.
    pub fn direction_for(&self, local: &Account) -> Option<Direction> {
        if self.to == *local {
            Some(Direction::Incoming)
        } else if self.from == *local {
            Some(Direction::Outgoing)
        } else {
            None
        }
    }
}

/// An outgoing transfer as handed over by the routing layer, still in its
/// textual protocol forms. The lifecycle engine encodes it for the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingTransfer {
    pub id: TransferId,
    /// Destination account in `<namespace>.<ledger-kind>.<address>` form
    pub account: Account,
    /// Fixed-point decimal amount, e.g. `"1.5"`
    pub amount: String,
    pub execution_condition: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_to_self: Option<serde_json::Value>,
}
