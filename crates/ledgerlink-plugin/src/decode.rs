//! Transfer decoder
//!
//! Turns the raw on-chain transfer tuple plus its memo into a canonical
//! [`Transfer`]. The tuple layout is positional, exactly as the read-only
//! contract call returns it: from, to, amount, condition, expiry, state.

use ledgerlink_codec as codec;
use ledgerlink_types::{LedgerProfile, PluginError, Result, Transfer, TransferState};

/// Decode an on-chain transfer.
///
/// An unknown state ordinal is an unrecoverable decode error. A memo that
/// fails to parse degrades to an empty object; it must not block the
/// transfer. Consistency between condition and any fulfillment is not
/// checked here — the ledger contract enforces that.
pub fn decode_transfer(
    profile: &LedgerProfile,
    transfer_id: &str,
    tuple: &[String],
    memo: &str,
) -> Result<Transfer> {
    let id = codec::transfer_id_from_onchain(transfer_id)?;
    let field = |index: usize| -> Result<&str> {
        tuple.get(index).map(String::as_str).ok_or_else(|| {
            PluginError::malformed(
                "transfer tuple",
                format!("missing field {index}, tuple has {}", tuple.len()),
            )
        })
    };

    let from = codec::account_from_address(profile, field(0)?);
    let to = codec::account_from_address(profile, field(1)?);
    let amount = field(2)?.parse()?;
    let condition = codec::condition_from_onchain(profile, field(3)?)?;

    let expiry_field = field(4)?;
    let expiry: u64 = expiry_field.parse().map_err(|_| {
        PluginError::malformed("transfer tuple", format!("bad expiry {expiry_field:?}"))
    })?;
    let expires_at = codec::timestamp_from_unix(expiry)?;

    let state_field = field(5)?;
    let state = state_field
        .parse::<u8>()
        .ok()
        .and_then(TransferState::from_code)
        .ok_or_else(|| PluginError::undecodable("transfer state", state_field))?;

    Ok(Transfer {
        id,
        from,
        to,
        amount,
        data: codec::decode_memo(memo),
        execution_condition: codec::encode_condition(profile, &condition),
        expires_at,
        state,
        note_to_self: None,
    })
}
