//! Ledgerlink Codec - Pure conversions between on-chain and protocol forms
//!
//! Every function here is stateless and total over its valid input domain,
//! failing with `MalformedEncoding` otherwise. The one deliberate
//! exception is memo decoding: a corrupt memo degrades to an empty JSON
//! object because memo corruption must never block transfer processing.
//!
//! Conversions covered:
//!
//! - ledger address ↔ account string (lowercased address, profile prefix)
//! - memo hex byte-string ↔ structured JSON payload
//! - condition digest ↔ `cc:<type>:<suite>:<base64url>:<len>` text form
//! - fulfillment preimage ↔ `cf:<type>:<base64url>` text form
//! - fixed-point decimal amount ↔ integer base units (exact, no rounding)
//! - Unix seconds ↔ timestamp, exact to the second
//! - transfer id ↔ on-chain 16-byte hex form

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use ledgerlink_types::{
    Account, Amount, Condition, Fulfillment, LedgerProfile, PluginError, Result, TransferId,
};

// ============================================================================
// Accounts
// ============================================================================

/// Build the account string for a ledger address, lowercasing it.
pub fn account_from_address(profile: &LedgerProfile, address: &str) -> Account {
    Account::new(format!(
        "{}.{}",
        profile.account_prefix,
        address.to_lowercase()
    ))
}

/// Extract the ledger address from an account string, validating the
/// profile prefix.
pub fn address_from_account(profile: &LedgerProfile, account: &Account) -> Result<String> {
    let prefix = format!("{}.", profile.account_prefix);
    let address = account
        .as_str()
        .strip_prefix(&prefix)
        .ok_or_else(|| {
            PluginError::malformed(
                "account",
                format!(
                    "expected prefix {:?}, got {:?}",
                    profile.account_prefix,
                    account.as_str()
                ),
            )
        })?;
    if address.is_empty() {
        return Err(PluginError::malformed("account", "empty address component"));
    }
    Ok(address.to_lowercase())
}

// ============================================================================
// Memos
// ============================================================================

/// Encode a JSON payload as the 0x-prefixed hex memo stored on-chain.
pub fn encode_memo(data: &serde_json::Value) -> String {
    let json = serde_json::to_string(data).unwrap_or_else(|_| String::from("{}"));
    format!("0x{}", hex::encode(json.as_bytes()))
}

/// Decode an on-chain hex memo into a JSON payload.
///
/// Bad hex, bad UTF-8, an empty memo or bad JSON all yield an empty
/// object rather than an error.
pub fn decode_memo(memo: &str) -> serde_json::Value {
    let stripped = strip_hex_prefix(memo);
    let bytes = match hex::decode(stripped) {
        Ok(bytes) => bytes,
        Err(_) => return serde_json::json!({}),
    };
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => return serde_json::json!({}),
    };
    serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({}))
}

// ============================================================================
// Conditions and fulfillments
// ============================================================================

/// Render a condition digest in its self-describing text form.
pub fn encode_condition(profile: &LedgerProfile, condition: &Condition) -> String {
    format!(
        "cc:{}:{}:{}:{}",
        profile.condition_type,
        profile.condition_suite,
        URL_SAFE_NO_PAD.encode(condition.as_bytes()),
        profile.digest_len
    )
}

/// Parse a `cc:<type>:<suite>:<base64url>:<len>` condition string.
pub fn parse_condition(profile: &LedgerProfile, text: &str) -> Result<Condition> {
    let malformed = |reason: String| PluginError::malformed("condition", reason);

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 5 || parts[0] != "cc" {
        return Err(malformed(format!("expected cc:<type>:<suite>:<digest>:<len>, got {text:?}")));
    }
    if parts[1] != profile.condition_type.to_string() || parts[2] != profile.condition_suite.to_string() {
        return Err(malformed(format!(
            "unsupported condition type {}:{}",
            parts[1], parts[2]
        )));
    }
    if parts[4] != profile.digest_len.to_string() {
        return Err(malformed(format!("unsupported digest length {}", parts[4])));
    }
    let digest = URL_SAFE_NO_PAD
        .decode(parts[3])
        .map_err(|e| malformed(format!("bad base64url digest: {e}")))?;
    if digest.len() != profile.digest_len {
        return Err(malformed(format!(
            "digest is {} bytes, profile requires {}",
            digest.len(),
            profile.digest_len
        )));
    }
    Ok(Condition::new(digest))
}

/// On-chain hex form of a condition digest.
pub fn condition_to_onchain(condition: &Condition) -> String {
    format!("0x{}", hex::encode(condition.as_bytes()))
}

/// Parse a condition digest from its on-chain hex form.
pub fn condition_from_onchain(profile: &LedgerProfile, raw: &str) -> Result<Condition> {
    let digest = hex::decode(strip_hex_prefix(raw))
        .map_err(|e| PluginError::malformed("condition", format!("bad hex digest: {e}")))?;
    if digest.len() != profile.digest_len {
        return Err(PluginError::malformed(
            "condition",
            format!(
                "digest is {} bytes, profile requires {}",
                digest.len(),
                profile.digest_len
            ),
        ));
    }
    Ok(Condition::new(digest))
}

/// Render a fulfillment preimage in its text form.
pub fn encode_fulfillment(profile: &LedgerProfile, fulfillment: &Fulfillment) -> String {
    format!(
        "cf:{}:{}",
        profile.fulfillment_type,
        URL_SAFE_NO_PAD.encode(fulfillment.as_bytes())
    )
}

/// Parse a `cf:<type>:<base64url>` fulfillment string.
pub fn parse_fulfillment(profile: &LedgerProfile, text: &str) -> Result<Fulfillment> {
    let malformed = |reason: String| PluginError::malformed("fulfillment", reason);

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 || parts[0] != "cf" {
        return Err(malformed(format!("expected cf:<type>:<preimage>, got {text:?}")));
    }
    if parts[1] != profile.fulfillment_type.to_string() {
        return Err(malformed(format!("unsupported fulfillment type {}", parts[1])));
    }
    let preimage = URL_SAFE_NO_PAD
        .decode(parts[2])
        .map_err(|e| malformed(format!("bad base64url preimage: {e}")))?;
    Ok(Fulfillment::new(preimage))
}

/// On-chain hex form of a fulfillment preimage.
pub fn fulfillment_to_onchain(fulfillment: &Fulfillment) -> String {
    format!("0x{}", hex::encode(fulfillment.as_bytes()))
}

/// Parse a fulfillment preimage from its on-chain hex form.
pub fn fulfillment_from_onchain(raw: &str) -> Result<Fulfillment> {
    hex::decode(strip_hex_prefix(raw))
        .map(Fulfillment::new)
        .map_err(|e| PluginError::malformed("fulfillment", format!("bad hex preimage: {e}")))
}

// ============================================================================
// Amounts
// ============================================================================

/// Parse a fixed-point decimal string into exact base units.
///
/// No rounding: input with more fractional digits than the profile scale
/// is rejected, as is anything non-numeric or out of range.
pub fn parse_decimal(profile: &LedgerProfile, text: &str) -> Result<Amount> {
    let malformed = |reason: String| PluginError::malformed("amount", reason);

    let (integral, fraction) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    if integral.is_empty() || !integral.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("not a decimal amount: {text:?}")));
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("not a decimal amount: {text:?}")));
    }
    if fraction.len() > profile.scale as usize {
        return Err(malformed(format!(
            "{text:?} has more precision than the ledger scale of {}",
            profile.scale
        )));
    }

    let units = scale_units(profile)?;
    let integral: u128 = integral
        .parse()
        .map_err(|_| malformed(format!("integral part out of range: {text:?}")))?;

    let fraction_units = if fraction.is_empty() {
        0
    } else {
        let padding = 10u128.pow(profile.scale - fraction.len() as u32);
        let fraction: u128 = fraction
            .parse()
            .map_err(|_| malformed(format!("fractional part out of range: {text:?}")))?;
        fraction
            .checked_mul(padding)
            .ok_or_else(|| malformed(format!("fractional part out of range: {text:?}")))?
    };

    integral
        .checked_mul(units)
        .and_then(|v| v.checked_add(fraction_units))
        .map(Amount::from_base_units)
        .ok_or_else(|| malformed(format!("amount exceeds representable range: {text:?}")))
}

/// Render base units as a fixed-point decimal string, trimming trailing
/// fractional zeros (`"1.5"`, `"3"`).
pub fn format_decimal(profile: &LedgerProfile, amount: Amount) -> Result<String> {
    let units = scale_units(profile)?;
    let integral = amount.base_units() / units;
    let fraction = amount.base_units() % units;
    if fraction == 0 {
        return Ok(integral.to_string());
    }
    let digits = format!("{:0width$}", fraction, width = profile.scale as usize);
    Ok(format!("{}.{}", integral, digits.trim_end_matches('0')))
}

fn scale_units(profile: &LedgerProfile) -> Result<u128> {
    10u128.checked_pow(profile.scale).ok_or_else(|| {
        PluginError::malformed("amount", format!("unusable ledger scale {}", profile.scale))
    })
}

// ============================================================================
// Timestamps
// ============================================================================

/// On-chain Unix seconds to a timestamp, exact to the second.
pub fn timestamp_from_unix(seconds: u64) -> Result<DateTime<Utc>> {
    let seconds = i64::try_from(seconds)
        .map_err(|_| PluginError::malformed("timestamp", format!("{seconds} out of range")))?;
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| PluginError::malformed("timestamp", format!("{seconds} out of range")))
}

/// Timestamp to on-chain Unix seconds, exact to the second.
pub fn timestamp_to_unix(at: &DateTime<Utc>) -> Result<u64> {
    u64::try_from(at.timestamp())
        .map_err(|_| PluginError::malformed("timestamp", format!("{at} precedes the epoch")))
}

// ============================================================================
// Transfer ids
// ============================================================================

/// On-chain form of a transfer id: 0x plus the raw 16 bytes as hex.
pub fn transfer_id_to_onchain(id: &TransferId) -> String {
    format!("0x{}", hex::encode(id.as_uuid().as_bytes()))
}

/// Parse a transfer id from its on-chain form.
pub fn transfer_id_from_onchain(raw: &str) -> Result<TransferId> {
    let bytes = hex::decode(strip_hex_prefix(raw))
        .map_err(|e| PluginError::malformed("transfer id", format!("bad hex: {e}")))?;
    let bytes: [u8; 16] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        PluginError::malformed("transfer id", format!("{} bytes, expected 16", bytes.len()))
    })?;
    Ok(TransferId::from_uuid(Uuid::from_bytes(bytes)))
}

fn strip_hex_prefix(raw: &str) -> &str {
    raw.strip_prefix("0x").unwrap_or(raw)
}
