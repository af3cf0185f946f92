//! Lifecycle notifications emitted to the routing layer
//!
//! One variant per notification name; fulfill variants additionally carry
//! the fulfillment text when the ledger revealed a preimage.

use serde::{Deserialize, Serialize};

use ledgerlink_types::{Direction, Transfer, TransferState};

/// Notification delivered to plugin subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginEvent {
    Connect,
    Disconnect,
    OutgoingPrepare {
        transfer: Transfer,
    },
    IncomingPrepare {
        transfer: Transfer,
    },
    OutgoingFulfill {
        transfer: Transfer,
        /// `cf:<type>:<base64url>` when the event revealed the preimage;
        /// absent when only the on-ledger state said fulfill
        #[serde(skip_serializing_if = "Option::is_none")]
        fulfillment: Option<String>,
    },
    IncomingFulfill {
        transfer: Transfer,
        #[serde(skip_serializing_if = "Option::is_none")]
        fulfillment: Option<String>,
    },
    OutgoingCancel {
        transfer: Transfer,
    },
    IncomingCancel {
        transfer: Transfer,
    },
    OutgoingReject {
        transfer: Transfer,
    },
    IncomingReject {
        transfer: Transfer,
    },
}

impl PluginEvent {
    /// Build the `<direction>_<state>` notification for a reconciled
    /// transfer.
    pub fn transfer(direction: Direction, transfer: Transfer, fulfillment: Option<String>) -> Self {
        use Direction::*;
        use TransferState::*;
        match (direction, transfer.state) {
            (Outgoing, Prepare) => Self::OutgoingPrepare { transfer },
            (Incoming, Prepare) => Self::IncomingPrepare { transfer },
            (Outgoing, Fulfill) => Self::OutgoingFulfill { transfer, fulfillment },
            (Incoming, Fulfill) => Self::IncomingFulfill { transfer, fulfillment },
            (Outgoing, Cancel) => Self::OutgoingCancel { transfer },
            (Incoming, Cancel) => Self::IncomingCancel { transfer },
            (Outgoing, Reject) => Self::OutgoingReject { transfer },
            (Incoming, Reject) => Self::IncomingReject { transfer },
        }
    }

    /// The notification name as the routing layer knows it
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::OutgoingPrepare { .. } => "outgoing_prepare",
            Self::IncomingPrepare { .. } => "incoming_prepare",
            Self::OutgoingFulfill { .. } => "outgoing_fulfill",
            Self::IncomingFulfill { .. } => "incoming_fulfill",
            Self::OutgoingCancel { .. } => "outgoing_cancel",
            Self::IncomingCancel { .. } => "incoming_cancel",
            Self::OutgoingReject { .. } => "outgoing_reject",
            Self::IncomingReject { .. } => "incoming_reject",
        }
    }

    /// The reconciled transfer, for the eight transfer-carrying variants
    pub fn as_transfer(&self) -> Option<&Transfer> {
        match self {
            Self::Connect | Self::Disconnect => None,
            Self::OutgoingPrepare { transfer }
            | Self::IncomingPrepare { transfer }
            | Self::OutgoingFulfill { transfer, .. }
            | Self::IncomingFulfill { transfer, .. }
            | Self::OutgoingCancel { transfer }
            | Self::IncomingCancel { transfer }
            | Self::OutgoingReject { transfer }
            | Self::IncomingReject { transfer } => Some(transfer),
        }
    }
}
