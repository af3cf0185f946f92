//! Confirmation waiter
//!
//! Polls the ledger until a receipt exists for a submitted transaction.
//! Transient read errors count as not-yet-confirmed; the loop never
//! terminates on them. Receipt absence and transaction failure are
//! observably the same through this interface; callers that need to
//! detect a revert must inspect `Receipt::status` themselves.

use std::time::Duration;

use tracing::debug;

use ledgerlink_client::{LedgerRpcClient, Receipt, TxHandle};
use ledgerlink_types::{PluginError, Result};

/// Fixed interval between receipt polls.
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Wait until the ledger reports a receipt for `handle`.
///
/// There is no deadline of its own: the future polls indefinitely. It is
/// an ordinary future, so a caller wanting bounded latency can drop it,
/// race it in `select!`, or use [`wait_for_receipt_timeout`] — the poll
/// timer is owned by the future and does not leak.
pub async fn wait_for_receipt(client: &dyn LedgerRpcClient, handle: &TxHandle) -> Result<Receipt> {
    loop {
        match client.transaction_receipt(handle).await {
            Ok(Some(receipt)) => {
                debug!(tx = %handle, "receipt observed");
                return Ok(receipt);
            }
            Ok(None) => {}
            // transient read error: not yet confirmed, keep polling
            Err(err) => debug!(tx = %handle, "receipt poll failed: {err}"),
        }
        tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
    }
}

/// [`wait_for_receipt`], bounded by `deadline`.
pub async fn wait_for_receipt_timeout(
    client: &dyn LedgerRpcClient,
    handle: &TxHandle,
    deadline: Duration,
) -> Result<Receipt> {
    tokio::time::timeout(deadline, wait_for_receipt(client, handle))
        .await
        .map_err(|_| PluginError::ReceiptTimeout {
            tx_hash: handle.to_string(),
        })?
}
