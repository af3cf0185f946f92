//! Event reconciler
//!
//! Each contract event is a pointer, not a payload: it names a transfer,
//! and reconciliation fetches the full tuple and memo, decodes them,
//! derives direction, attaches local metadata and emits the lifecycle
//! notification. Every stage failure is contained at the event boundary —
//! the routing layer may miss one notification, the listener never stalls.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use ledgerlink_client::{EventStream, LedgerEvent, LedgerRpcClient};
use ledgerlink_codec as codec;
use ledgerlink_types::{Account, LedgerProfile, Result, TransferId, TransferState};

use crate::decode::decode_transfer;
use crate::events::PluginEvent;
use crate::notes::NoteStore;

/// Everything one subscription loop needs to reconcile events.
pub(crate) struct Reconciler {
    pub client: Arc<dyn LedgerRpcClient>,
    pub profile: LedgerProfile,
    pub local_account: Account,
    pub notes: Arc<NoteStore>,
    /// First terminal state observed per transfer id; later terminal
    /// events for the same id are dropped, keeping observed transitions
    /// monotonic under duplicate or late delivery.
    pub terminal: Arc<DashMap<TransferId, TransferState>>,
    pub events: broadcast::Sender<PluginEvent>,
}

impl Reconciler {
    /// Drive one contract-event subscription until its stream ends.
    pub async fn run(self: Arc<Self>, mut stream: EventStream) {
        while let Some(item) = stream.next().await {
            match item {
                Ok(LedgerEvent::Debug { message }) => debug!("contract debug: {message}"),
                Ok(event) => {
                    if let Err(err) = self.reconcile(event).await {
                        warn!("dropped ledger event: {err}");
                    }
                }
                Err(err) => warn!("event subscription error: {err}"),
            }
        }
        debug!("event subscription ended");
    }

    async fn reconcile(&self, event: LedgerEvent) -> Result<()> {
        let (transfer_id, fulfillment) = match event {
            LedgerEvent::Update { transfer_id } => (transfer_id, None),
            LedgerEvent::Fulfill {
                transfer_id,
                fulfillment,
            } => (transfer_id, Some(fulfillment)),
            LedgerEvent::Debug { .. } => return Ok(()),
        };

        // the event only identifies the transfer; fetch tuple and memo
        let tuple = self.client.call("transfers", &[transfer_id.clone()]).await?;
        let memo_row = self.client.call("memos", &[transfer_id.clone()]).await?;
        let memo = memo_row.first().map(String::as_str).unwrap_or("0x");

        let mut transfer = decode_transfer(&self.profile, &transfer_id, &tuple, memo)?;

        // a revealed preimage is the authoritative fulfillment signal,
        // whatever the decoded state code says
        let fulfillment = match fulfillment {
            Some(raw) => {
                transfer.state = TransferState::Fulfill;
                let preimage = codec::fulfillment_from_onchain(&raw)?;
                Some(codec::encode_fulfillment(&self.profile, &preimage))
            }
            None => None,
        };

        let Some(direction) = transfer.direction_for(&self.local_account) else {
            debug!(id = %transfer.id, "transfer involves neither side of the local account");
            return Ok(());
        };

        if transfer.state.is_terminal() {
            match self.terminal.entry(transfer.id) {
                Entry::Occupied(seen) => {
                    debug!(
                        id = %transfer.id,
                        seen = %seen.get(),
                        observed = %transfer.state,
                        "transfer already terminal, dropping event"
                    );
                    return Ok(());
                }
                Entry::Vacant(slot) => {
                    slot.insert(transfer.state);
                }
            }
        }

        transfer.note_to_self = self.notes.get(&transfer.id);

        let event = PluginEvent::transfer(direction, transfer, fulfillment);
        debug!(name = event.name(), "emitting lifecycle notification");
        // nobody listening is fine
        let _ = self.events.send(event);
        Ok(())
    }
}
