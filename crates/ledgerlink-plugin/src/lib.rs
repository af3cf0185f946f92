//! Ledgerlink Plugin - Transfer lifecycle reconciliation engine
//!
//! The plugin reconciles two consistency models: an authoritative,
//! eventually-finalized contract ledger, and a local event-driven protocol
//! expecting prompt lifecycle notifications. It:
//!
//! - submits conditional transfers and fulfillments and waits for
//!   confirmation ([`confirm`])
//! - subscribes to contract events and decodes them into canonical
//!   transfer records ([`decode`], the reconciler)
//! - derives transfer direction relative to the local account
//! - bridges local-only metadata with on-chain state through an ephemeral
//!   side channel ([`NoteStore`])
//!
//! Errors from caller-invoked operations propagate; errors inside the
//! background event and polling loops are contained and logged.

pub mod confirm;
pub mod decode;
pub mod events;
pub mod notes;

mod reconcile;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use ledgerlink_client::{ContractCall, LedgerEventKind, LedgerRpcClient};
use ledgerlink_codec as codec;

pub use events::PluginEvent;
pub use notes::NoteStore;

pub use ledgerlink_types::{
    Account, Amount, Direction, LedgerInfo, LedgerProfile, OutgoingTransfer, PluginConfig,
    PluginError, Result, Transfer, TransferId, TransferState,
};

use reconcile::Reconciler;

/// Gas allowance for both submission paths.
pub const DEFAULT_GAS_LIMIT: u64 = 3_000_000;

/// Contract events the plugin subscribes to while connected.
const SUBSCRIBED_EVENTS: [LedgerEventKind; 3] = [
    LedgerEventKind::Update,
    LedgerEventKind::Fulfill,
    LedgerEventKind::Debug,
];

const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// The ledger-plugin lifecycle engine.
///
/// One instance per local account and contract. The ledger client arrives
/// already built — transports and ABI encoding are the collaborator's
/// concern — and the plugin owns everything above it.
pub struct LedgerPlugin {
    config: PluginConfig,
    local_account: Account,
    client: Arc<dyn LedgerRpcClient>,
    connected: AtomicBool,
    /// Serializes connect/disconnect so subscriptions are registered
    /// exactly once
    lifecycle: tokio::sync::Mutex<()>,
    subscriptions: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    notes: Arc<NoteStore>,
    terminal: Arc<DashMap<TransferId, TransferState>>,
    events: broadcast::Sender<PluginEvent>,
}

impl LedgerPlugin {
    pub fn new(config: PluginConfig, client: Arc<dyn LedgerRpcClient>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let local_account = codec::account_from_address(&config.profile, &config.address);
        Self {
            config,
            local_account,
            client,
            connected: AtomicBool::new(false),
            lifecycle: tokio::sync::Mutex::new(()),
            subscriptions: parking_lot::Mutex::new(Vec::new()),
            notes: Arc::new(NoteStore::new()),
            terminal: Arc::new(DashMap::new()),
            events,
        }
    }

    /// The local account identifier. Requires no connection.
    pub fn account(&self) -> Account {
        self.local_account.clone()
    }

    /// Ledger metadata for the routing layer. Requires no connection.
    pub fn info(&self) -> LedgerInfo {
        self.config.profile.info()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Receive lifecycle notifications from this plugin.
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    /// Register the contract event subscriptions and signal readiness.
    /// Idempotent: a no-op while already connected.
    pub async fn connect(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        let reconciler = Arc::new(Reconciler {
            client: Arc::clone(&self.client),
            profile: self.config.profile.clone(),
            local_account: self.local_account.clone(),
            notes: Arc::clone(&self.notes),
            terminal: Arc::clone(&self.terminal),
            events: self.events.clone(),
        });

        let mut handles = Vec::with_capacity(SUBSCRIBED_EVENTS.len());
        for kind in SUBSCRIBED_EVENTS {
            match self.client.subscribe(kind).await {
                Ok(stream) => handles.push(tokio::spawn(Arc::clone(&reconciler).run(stream))),
                Err(err) => {
                    for handle in handles {
                        handle.abort();
                    }
                    return Err(err);
                }
            }
        }
        *self.subscriptions.lock() = handles;

        self.connected.store(true, Ordering::SeqCst);
        info!(account = %self.local_account, contract = %self.config.contract, "connected to contract ledger");
        let _ = self.events.send(PluginEvent::Connect);
        Ok(())
    }

    /// Tear down the client session. Idempotent. The ledger-side
    /// subscriptions are assumed to lapse with the client connection;
    /// only the local subscription tasks are stopped.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        for task in self.subscriptions.lock().drain(..) {
            task.abort();
        }
        info!("disconnected from contract ledger");
        let _ = self.events.send(PluginEvent::Disconnect);
    }

    /// Submit an outgoing conditional transfer and wait for confirmation.
    ///
    /// Resolves only once the ledger reports a receipt; the note-to-self
    /// is stored after that, never speculatively. Concurrent submissions
    /// for distinct ids are independent; a duplicate id is rejected by
    /// the ledger.
    pub async fn submit_transfer(&self, transfer: OutgoingTransfer) -> Result<()> {
        self.ensure_connected()?;
        let profile = &self.config.profile;

        let to_address = codec::address_from_account(profile, &transfer.account)?;
        let amount = codec::parse_decimal(profile, &transfer.amount)?;
        let condition = codec::parse_condition(profile, &transfer.execution_condition)?;
        let expiry = codec::timestamp_to_unix(&transfer.expires_at)?;

        let call = ContractCall {
            method: "createTransfer".to_string(),
            args: vec![
                to_address,
                codec::condition_to_onchain(&condition),
                codec::transfer_id_to_onchain(&transfer.id),
                expiry.to_string(),
                codec::encode_memo(&transfer.data),
            ],
            sender: self.config.address.clone(),
            value: amount,
            gas: DEFAULT_GAS_LIMIT,
        };

        let handle = self.client.submit_transaction(call).await?;
        debug!(tx = %handle, id = %transfer.id, "transfer submitted, awaiting receipt");
        confirm::wait_for_receipt(self.client.as_ref(), &handle).await?;

        if let Some(note) = transfer.note_to_self {
            self.notes.put(transfer.id, note);
        }
        info!(id = %transfer.id, amount = %amount, "transfer confirmed");
        Ok(())
    }

    /// Submit a fulfillment preimage for a held transfer and wait for
    /// confirmation.
    ///
    /// Resolves with no payload: the Fulfill event, not this return, is
    /// the authoritative notification of success to observers.
    pub async fn submit_fulfillment(&self, id: &TransferId, fulfillment: &str) -> Result<()> {
        self.ensure_connected()?;
        let preimage = codec::parse_fulfillment(&self.config.profile, fulfillment)?;

        let call = ContractCall {
            method: "fulfillTransfer".to_string(),
            args: vec![
                codec::transfer_id_to_onchain(id),
                codec::fulfillment_to_onchain(&preimage),
            ],
            sender: self.config.address.clone(),
            value: Amount::ZERO,
            gas: DEFAULT_GAS_LIMIT,
        };

        let handle = self.client.submit_transaction(call).await?;
        debug!(tx = %handle, %id, "fulfillment submitted, awaiting receipt");
        confirm::wait_for_receipt(self.client.as_ref(), &handle).await?;
        info!(%id, "fulfillment confirmed");
        Ok(())
    }

    /// The local account's ledger balance, in exact base units.
    pub async fn balance(&self) -> Result<Amount> {
        self.ensure_connected()?;
        self.client.balance(&self.config.address).await
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(PluginError::NotConnected);
        }
        Ok(())
    }
}

impl Drop for LedgerPlugin {
    fn drop(&mut self) {
        for task in self.subscriptions.lock().drain(..) {
            task.abort();
        }
    }
}
