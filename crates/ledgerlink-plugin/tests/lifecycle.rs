//! End-to-end lifecycle tests against the in-memory contract ledger.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;
use tokio::time::timeout;

use ledgerlink_client::memory::{InMemoryLedger, TransferRow};
use ledgerlink_client::LedgerEvent;
use ledgerlink_codec as codec;
use ledgerlink_plugin::{
    Account, Amount, LedgerPlugin, LedgerProfile, OutgoingTransfer, PluginConfig, PluginError,
    PluginEvent, TransferId,
};
use ledgerlink_types::{Condition, Fulfillment};

const LOCAL: &str = "0xAA";
const PEER: &str = "0xBB";

fn eth(whole: u128) -> Amount {
    Amount::from_base_units(whole * 1_000_000_000_000_000_000)
}

fn profile() -> LedgerProfile {
    LedgerProfile::ethereum()
}

fn config_for(address: &str) -> PluginConfig {
    PluginConfig {
        endpoint: "http://localhost:8545".to_string(),
        address: address.to_string(),
        contract: "0xC0FFEE".to_string(),
        interface: json!([]),
        profile: profile(),
    }
}

fn condition_text() -> String {
    codec::encode_condition(&profile(), &Condition::new(vec![0xab; 32]))
}

fn outgoing(id: TransferId, amount: &str, note: Option<serde_json::Value>) -> OutgoingTransfer {
    OutgoingTransfer {
        id,
        account: Account::new("g.crypto.ethereum.0xbb"),
        amount: amount.to_string(),
        execution_condition: condition_text(),
        expires_at: Utc::now() + chrono::Duration::hours(1),
        data: json!({"purpose": "lunch"}),
        note_to_self: note,
    }
}

async fn connected_plugin(ledger: &Arc<InMemoryLedger>, address: &str) -> LedgerPlugin {
    let client: Arc<dyn ledgerlink_client::LedgerRpcClient> = ledger.clone();
    let plugin = LedgerPlugin::new(config_for(address), client);
    plugin.connect().await.unwrap();
    plugin
}

async fn next_event(rx: &mut Receiver<PluginEvent>) -> PluginEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no plugin event within 5s")
        .expect("plugin event channel closed")
}

/// Script a transfer row (and an empty `{}` memo) directly on the ledger,
/// returning the on-chain id.
async fn script_transfer(
    ledger: &InMemoryLedger,
    id: &TransferId,
    from: &str,
    to: &str,
    state: u8,
) -> String {
    let id_hex = codec::transfer_id_to_onchain(id);
    ledger
        .put_transfer_row(
            &id_hex,
            TransferRow {
                from: from.to_string(),
                to: to.to_string(),
                amount: eth(1),
                condition: format!("0x{}", "ab".repeat(32)),
                expires_at: 1_700_003_600,
                state,
            },
        )
        .await;
    ledger.put_memo(&id_hex, "0x7b7d").await;
    id_hex
}

#[tokio::test]
async fn submit_transfer_round_trips_through_the_ledger() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_balance("0xaa", eth(10)).await;
    let plugin = connected_plugin(&ledger, LOCAL).await;
    let mut rx = plugin.subscribe();

    let id = TransferId::new();
    plugin
        .submit_transfer(outgoing(id, "1.5", None))
        .await
        .unwrap();

    // the on-ledger row carries exact base units
    let row = ledger
        .transfer_row(&codec::transfer_id_to_onchain(&id))
        .await
        .unwrap();
    assert_eq!(row.amount.base_units(), 1_500_000_000_000_000_000);
    assert_eq!(row.from, "0xaa");
    assert_eq!(row.to, "0xbb");
    assert_eq!(row.state, 0);
    assert_eq!(ledger.balance_of("0xaa").await, eth(10).checked_sub(row.amount).unwrap());

    // the creation event reconciles back into protocol forms
    let event = next_event(&mut rx).await;
    assert_eq!(event.name(), "outgoing_prepare");
    let transfer = event.as_transfer().unwrap();
    assert_eq!(transfer.id, id);
    assert_eq!(codec::format_decimal(&profile(), transfer.amount).unwrap(), "1.5");
    assert_eq!(transfer.execution_condition, condition_text());
    assert_eq!(transfer.data, json!({"purpose": "lunch"}));
}

#[tokio::test]
async fn prepare_and_fulfill_notify_both_parties() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_balance("0xaa", eth(10)).await;

    let alice = connected_plugin(&ledger, LOCAL).await;
    let bob = connected_plugin(&ledger, PEER).await;
    let mut alice_rx = alice.subscribe();
    let mut bob_rx = bob.subscribe();

    let id = TransferId::new();
    let note = json!({"invoice": "2026-08-001"});
    alice
        .submit_transfer(outgoing(id, "2.5", Some(note.clone())))
        .await
        .unwrap();

    assert_eq!(next_event(&mut alice_rx).await.name(), "outgoing_prepare");
    let prepared = next_event(&mut bob_rx).await;
    assert_eq!(prepared.name(), "incoming_prepare");
    // the note never crosses the ledger
    assert_eq!(prepared.as_transfer().unwrap().note_to_self, None);

    let fulfillment = codec::encode_fulfillment(
        &profile(),
        &Fulfillment::new(b"super secret preimage".to_vec()),
    );
    bob.submit_fulfillment(&id, &fulfillment).await.unwrap();

    let alice_event = next_event(&mut alice_rx).await;
    assert_eq!(alice_event.name(), "outgoing_fulfill");
    match &alice_event {
        PluginEvent::OutgoingFulfill {
            transfer,
            fulfillment: revealed,
        } => {
            assert_eq!(revealed.as_deref(), Some(fulfillment.as_str()));
            // alice stored her note at confirmation and gets it back here
            assert_eq!(transfer.note_to_self, Some(note));
        }
        other => panic!("expected outgoing_fulfill, got {other:?}"),
    }

    let bob_event = next_event(&mut bob_rx).await;
    assert_eq!(bob_event.name(), "incoming_fulfill");

    // funds released to bob
    assert_eq!(
        ledger.balance_of("0xbb").await.base_units(),
        2_500_000_000_000_000_000
    );
    assert_eq!(
        ledger.balance_of("0xaa").await.base_units(),
        7_500_000_000_000_000_000
    );
}

#[tokio::test]
async fn duplicate_transfer_id_is_rejected_by_the_ledger() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_balance("0xaa", eth(10)).await;
    let plugin = connected_plugin(&ledger, LOCAL).await;

    let id = TransferId::new();
    plugin.submit_transfer(outgoing(id, "1", None)).await.unwrap();
    let err = plugin.submit_transfer(outgoing(id, "1", None)).await;
    assert!(matches!(err, Err(PluginError::LedgerRpc { .. })));
}

#[tokio::test]
async fn balance_reports_exact_base_units() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger
        .set_balance("0xaa", Amount::from_base_units(123_456_789_000_000_001))
        .await;
    let plugin = connected_plugin(&ledger, LOCAL).await;

    let balance = plugin.balance().await.unwrap();
    assert_eq!(balance.to_string(), "123456789000000001");

    plugin.disconnect().await;
    assert!(matches!(plugin.balance().await, Err(PluginError::NotConnected)));
}

#[tokio::test]
async fn connect_and_disconnect_are_idempotent() {
    let ledger = Arc::new(InMemoryLedger::new());
    let client: Arc<dyn ledgerlink_client::LedgerRpcClient> = ledger.clone();
    let plugin = LedgerPlugin::new(config_for(LOCAL), client);
    let mut rx = plugin.subscribe();

    plugin.connect().await.unwrap();
    plugin.connect().await.unwrap();
    assert!(plugin.is_connected());

    plugin.disconnect().await;
    plugin.disconnect().await;
    assert!(!plugin.is_connected());

    assert_eq!(next_event(&mut rx).await.name(), "connect");
    assert_eq!(next_event(&mut rx).await.name(), "disconnect");
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    // a fresh connect after disconnect resubscribes
    plugin.connect().await.unwrap();
    assert_eq!(next_event(&mut rx).await.name(), "connect");
    assert!(plugin.is_connected());
}

#[tokio::test]
async fn corrupt_memo_still_fulfills_with_empty_data() {
    let ledger = Arc::new(InMemoryLedger::new());
    let plugin = connected_plugin(&ledger, LOCAL).await;
    let mut rx = plugin.subscribe();

    let id = TransferId::new();
    let id_hex = script_transfer(&ledger, &id, "0xbb", "0xaa", 0).await;
    ledger.put_memo(&id_hex, "0xnot-actually-hex").await;

    let preimage = Fulfillment::new(b"preimage".to_vec());
    ledger.emit(LedgerEvent::Fulfill {
        transfer_id: id_hex,
        fulfillment: codec::fulfillment_to_onchain(&preimage),
    });

    let event = next_event(&mut rx).await;
    match event {
        PluginEvent::IncomingFulfill {
            transfer,
            fulfillment,
        } => {
            assert_eq!(transfer.id, id);
            assert_eq!(transfer.data, json!({}));
            // the revealed preimage overrides the stale on-ledger state code
            assert_eq!(
                fulfillment,
                Some(codec::encode_fulfillment(&profile(), &preimage))
            );
        }
        other => panic!("expected incoming_fulfill, got {other:?}"),
    }
}

#[tokio::test]
async fn transfers_between_strangers_are_ignored() {
    let ledger = Arc::new(InMemoryLedger::new());
    let plugin = connected_plugin(&ledger, LOCAL).await;
    let mut rx = plugin.subscribe();

    let foreign = TransferId::new();
    let foreign_hex = script_transfer(&ledger, &foreign, "0xcc", "0xdd", 0).await;
    ledger.emit(LedgerEvent::Update {
        transfer_id: foreign_hex,
    });

    // a marker event behind it on the same subscription proves the
    // foreign event was dropped, not delayed
    let marker = TransferId::new();
    let marker_hex = script_transfer(&ledger, &marker, "0xbb", "0xaa", 0).await;
    ledger.emit(LedgerEvent::Update {
        transfer_id: marker_hex,
    });

    let event = next_event(&mut rx).await;
    assert_eq!(event.name(), "incoming_prepare");
    assert_eq!(event.as_transfer().unwrap().id, marker);
}

#[tokio::test]
async fn terminal_states_are_monotonic() {
    let ledger = Arc::new(InMemoryLedger::new());
    let plugin = connected_plugin(&ledger, LOCAL).await;
    let mut rx = plugin.subscribe();

    let id = TransferId::new();
    let id_hex = script_transfer(&ledger, &id, "0xbb", "0xaa", 1).await;

    ledger.emit(LedgerEvent::Update {
        transfer_id: id_hex.clone(),
    });
    let event = next_event(&mut rx).await;
    assert_eq!(event.name(), "incoming_fulfill");

    // a duplicate delivery and a conflicting terminal rewrite both vanish
    ledger.emit(LedgerEvent::Update {
        transfer_id: id_hex.clone(),
    });
    ledger
        .put_transfer_row(
            &id_hex,
            TransferRow {
                from: "0xbb".to_string(),
                to: "0xaa".to_string(),
                amount: eth(1),
                condition: format!("0x{}", "ab".repeat(32)),
                expires_at: 1_700_003_600,
                state: 2,
            },
        )
        .await;
    ledger.emit(LedgerEvent::Update {
        transfer_id: id_hex.clone(),
    });

    let marker = TransferId::new();
    let marker_hex = script_transfer(&ledger, &marker, "0xbb", "0xaa", 0).await;
    ledger.emit(LedgerEvent::Update {
        transfer_id: marker_hex,
    });
    let event = next_event(&mut rx).await;
    assert_eq!(event.name(), "incoming_prepare");
    assert_eq!(event.as_transfer().unwrap().id, marker);

    // the same id stays silent on the fulfill subscription too
    ledger.emit(LedgerEvent::Fulfill {
        transfer_id: id_hex,
        fulfillment: "0x0102".to_string(),
    });
    let fulfill_marker = TransferId::new();
    let fulfill_marker_hex = script_transfer(&ledger, &fulfill_marker, "0xbb", "0xaa", 0).await;
    ledger.emit(LedgerEvent::Fulfill {
        transfer_id: fulfill_marker_hex,
        fulfillment: "0x0102".to_string(),
    });
    let event = next_event(&mut rx).await;
    assert_eq!(event.name(), "incoming_fulfill");
    assert_eq!(event.as_transfer().unwrap().id, fulfill_marker);
}

#[tokio::test]
async fn undecodable_events_do_not_stall_the_listener() {
    let ledger = Arc::new(InMemoryLedger::new());
    let plugin = connected_plugin(&ledger, LOCAL).await;
    let mut rx = plugin.subscribe();

    // unknown state ordinal
    let broken = TransferId::new();
    let broken_hex = script_transfer(&ledger, &broken, "0xbb", "0xaa", 7).await;
    ledger.emit(LedgerEvent::Update {
        transfer_id: broken_hex,
    });

    // event naming a transfer the contract does not know
    ledger.emit(LedgerEvent::Update {
        transfer_id: "0x11112222333344445555666677778888".to_string(),
    });

    // event whose id is not even an id
    ledger.emit(LedgerEvent::Update {
        transfer_id: "0xgarbage".to_string(),
    });

    let marker = TransferId::new();
    let marker_hex = script_transfer(&ledger, &marker, "0xbb", "0xaa", 0).await;
    ledger.emit(LedgerEvent::Update {
        transfer_id: marker_hex,
    });

    let event = next_event(&mut rx).await;
    assert_eq!(event.name(), "incoming_prepare");
    assert_eq!(event.as_transfer().unwrap().id, marker);
}

#[tokio::test(start_paused = true)]
async fn note_is_stored_only_after_confirmation() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.set_balance("0xaa", eth(10)).await;
    ledger.set_receipt_delay(3);

    let plugin = Arc::new(connected_plugin(&ledger, LOCAL).await);
    let mut rx = plugin.subscribe();

    let id = TransferId::new();
    let note = json!({"secret": "route-7"});
    let submit = tokio::spawn({
        let plugin = Arc::clone(&plugin);
        let transfer = outgoing(id, "1.5", Some(note.clone()));
        async move { plugin.submit_transfer(transfer).await }
    });

    // the creation event lands while the receipt is still pending, so
    // the note is not attached yet
    let event = next_event(&mut rx).await;
    assert_eq!(event.name(), "outgoing_prepare");
    assert_eq!(event.as_transfer().unwrap().note_to_self, None);

    submit.await.unwrap().unwrap();

    // replayed after confirmation, the note is visible
    ledger.emit(LedgerEvent::Update {
        transfer_id: codec::transfer_id_to_onchain(&id),
    });
    let event = next_event(&mut rx).await;
    assert_eq!(event.name(), "outgoing_prepare");
    assert_eq!(event.as_transfer().unwrap().note_to_self, Some(note));
}
