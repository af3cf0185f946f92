//! In-memory contract ledger
//!
//! A scriptable [`LedgerRpcClient`] for tests and demos. It mimics the
//! conditional-transfer contract closely enough to drive the plugin end to
//! end: balances move on create/fulfill, duplicate ids are rejected, and
//! contract events fan out to subscribers. It does not verify fulfillment
//! preimages against condition digests (neither does the adapter; that is
//! the real contract's job) and it "mines" instantly, with receipt
//! visibility delayed by a configurable number of polls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use ledgerlink_types::{Amount, PluginError, Result};

use crate::{ContractCall, EventStream, LedgerEvent, LedgerEventKind, LedgerRpcClient, Receipt, TxHandle};

const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// On-chain transfer tuple as the contract stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRow {
    pub from: String,
    pub to: String,
    pub amount: Amount,
    /// 0x-prefixed condition digest
    pub condition: String,
    pub expires_at: u64,
    pub state: u8,
}

impl TransferRow {
    /// The stringified positional tuple a read-only call returns
    pub fn to_tuple(&self) -> Vec<String> {
        vec![
            self.from.clone(),
            self.to.clone(),
            self.amount.to_string(),
            self.condition.clone(),
            self.expires_at.to_string(),
            self.state.to_string(),
        ]
    }
}

struct PendingReceipt {
    polls_remaining: u64,
    receipt: Receipt,
}

/// In-memory ledger backing the [`LedgerRpcClient`] trait.
pub struct InMemoryLedger {
    balances: RwLock<HashMap<String, Amount>>,
    transfers: RwLock<HashMap<String, TransferRow>>,
    memos: RwLock<HashMap<String, String>>,
    receipts: RwLock<HashMap<String, PendingReceipt>>,
    /// Number of receipt polls that see `None` before the receipt appears
    receipt_delay: AtomicU64,
    next_tx: AtomicU64,
    events: broadcast::Sender<LedgerEvent>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            balances: RwLock::new(HashMap::new()),
            transfers: RwLock::new(HashMap::new()),
            memos: RwLock::new(HashMap::new()),
            receipts: RwLock::new(HashMap::new()),
            receipt_delay: AtomicU64::new(0),
            next_tx: AtomicU64::new(1),
            events,
        }
    }

    /// Delay receipt visibility by `polls` receipt queries per transaction
    pub fn set_receipt_delay(&self, polls: u64) {
        self.receipt_delay.store(polls, Ordering::SeqCst);
    }

    pub async fn set_balance(&self, address: &str, balance: Amount) {
        self.balances
            .write()
            .await
            .insert(address.to_lowercase(), balance);
    }

    pub async fn balance_of(&self, address: &str) -> Amount {
        self.balances
            .read()
            .await
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Script a transfer row directly, bypassing `createTransfer`
    pub async fn put_transfer_row(&self, transfer_id: &str, row: TransferRow) {
        self.transfers
            .write()
            .await
            .insert(transfer_id.to_lowercase(), row);
    }

    /// Script a raw memo directly
    pub async fn put_memo(&self, transfer_id: &str, memo: &str) {
        self.memos
            .write()
            .await
            .insert(transfer_id.to_lowercase(), memo.to_string());
    }

    pub async fn transfer_row(&self, transfer_id: &str) -> Option<TransferRow> {
        self.transfers
            .read()
            .await
            .get(&transfer_id.to_lowercase())
            .cloned()
    }

    /// Inject a contract event, well-formed or not
    pub fn emit(&self, event: LedgerEvent) {
        let _ = self.events.send(event);
    }

    fn next_handle(&self) -> TxHandle {
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
        TxHandle(format!("0xtx{n:04}"))
    }

    async fn schedule_receipt(&self, handle: &TxHandle) {
        let receipt = Receipt {
            tx_hash: handle.clone(),
            block_number: Some(self.next_tx.load(Ordering::SeqCst)),
            status: Some(true),
        };
        self.receipts.write().await.insert(
            handle.0.clone(),
            PendingReceipt {
                polls_remaining: self.receipt_delay.load(Ordering::SeqCst),
                receipt,
            },
        );
    }

    async fn create_transfer(&self, call: &ContractCall) -> Result<()> {
        let [to, condition, transfer_id, expiry, memo] = call.args.as_slice() else {
            return Err(PluginError::rpc(format!(
                "createTransfer takes 5 arguments, got {}",
                call.args.len()
            )));
        };
        let transfer_id = transfer_id.to_lowercase();
        let expires_at: u64 = expiry
            .parse()
            .map_err(|_| PluginError::rpc(format!("bad expiry argument {expiry:?}")))?;

        let mut transfers = self.transfers.write().await;
        if transfers.contains_key(&transfer_id) {
            return Err(PluginError::rpc(format!(
                "transfer {transfer_id} already exists"
            )));
        }

        let sender = call.sender.to_lowercase();
        let mut balances = self.balances.write().await;
        let held = balances.get(&sender).copied().unwrap_or(Amount::ZERO);
        let remainder = held.checked_sub(call.value).ok_or_else(|| {
            PluginError::rpc(format!("insufficient funds: {held} < {}", call.value))
        })?;
        balances.insert(sender.clone(), remainder);

        transfers.insert(
            transfer_id.clone(),
            TransferRow {
                from: sender,
                to: to.to_lowercase(),
                amount: call.value,
                condition: condition.to_lowercase(),
                expires_at,
                state: 0,
            },
        );
        self.memos.write().await.insert(transfer_id.clone(), memo.clone());

        debug!(%transfer_id, value = %call.value, "transfer created");
        self.emit(LedgerEvent::Update { transfer_id });
        Ok(())
    }

    async fn fulfill_transfer(&self, call: &ContractCall) -> Result<()> {
        let [transfer_id, fulfillment] = call.args.as_slice() else {
            return Err(PluginError::rpc(format!(
                "fulfillTransfer takes 2 arguments, got {}",
                call.args.len()
            )));
        };
        let transfer_id = transfer_id.to_lowercase();

        let mut transfers = self.transfers.write().await;
        let row = transfers.get_mut(&transfer_id).ok_or_else(|| {
            PluginError::rpc(format!("unknown transfer {transfer_id}"))
        })?;
        if row.state != 0 {
            return Err(PluginError::rpc(format!(
                "transfer {transfer_id} is not fulfillable in state {}",
                row.state
            )));
        }
        row.state = 1;

        let mut balances = self.balances.write().await;
        let held = balances.get(&row.to).copied().unwrap_or(Amount::ZERO);
        let credited = held.checked_add(row.amount).ok_or_else(|| {
            PluginError::rpc(format!("balance overflow crediting {}", row.to))
        })?;
        balances.insert(row.to.clone(), credited);

        debug!(%transfer_id, "transfer fulfilled");
        self.emit(LedgerEvent::Fulfill {
            transfer_id,
            fulfillment: fulfillment.clone(),
        });
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerRpcClient for InMemoryLedger {
    async fn submit_transaction(&self, call: ContractCall) -> Result<TxHandle> {
        match call.method.as_str() {
            "createTransfer" => self.create_transfer(&call).await?,
            "fulfillTransfer" => self.fulfill_transfer(&call).await?,
            other => {
                return Err(PluginError::rpc(format!("unknown contract method {other:?}")))
            }
        }
        let handle = self.next_handle();
        self.schedule_receipt(&handle).await;
        Ok(handle)
    }

    async fn transaction_receipt(&self, handle: &TxHandle) -> Result<Option<Receipt>> {
        let mut receipts = self.receipts.write().await;
        match receipts.get_mut(&handle.0) {
            Some(pending) if pending.polls_remaining > 0 => {
                pending.polls_remaining -= 1;
                Ok(None)
            }
            Some(pending) => Ok(Some(pending.receipt.clone())),
            // absence and failure are observably the same here
            None => Ok(None),
        }
    }

    async fn subscribe(&self, kind: LedgerEventKind) -> Result<EventStream> {
        let mut rx = self.events.subscribe();
        let stream = stream! {
            loop {
                match rx.recv().await {
                    Ok(event) if event.kind() == kind => yield Ok(event),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        yield Err(PluginError::rpc(format!(
                            "event subscription lagged, {missed} events dropped"
                        )));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        Ok(stream.boxed())
    }

    async fn call(&self, method: &str, args: &[String]) -> Result<Vec<String>> {
        let transfer_id = args
            .first()
            .map(|id| id.to_lowercase())
            .ok_or_else(|| PluginError::rpc(format!("{method} takes a transfer id")))?;
        match method {
            "transfers" => {
                let transfers = self.transfers.read().await;
                let row = transfers.get(&transfer_id).ok_or_else(|| {
                    PluginError::rpc(format!("unknown transfer {transfer_id}"))
                })?;
                Ok(row.to_tuple())
            }
            "memos" => {
                let memos = self.memos.read().await;
                Ok(vec![memos.get(&transfer_id).cloned().unwrap_or_else(|| "0x".to_string())])
            }
            other => Err(PluginError::rpc(format!("unknown contract method {other:?}"))),
        }
    }

    async fn balance(&self, address: &str) -> Result<Amount> {
        Ok(self.balance_of(address).await)
    }
}
