//! Ledger profile and construction-time configuration
//!
//! The numeric tags in the condition and fulfillment text forms (`0`, `3`,
//! `32`) describe one specific hashing/length profile. They live here as
//! configuration so an alternate ledger flavor is a substitution, not an
//! edit.

use serde::{Deserialize, Serialize};

/// Constants of one ledger flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerProfile {
    /// Account prefix, `<namespace>.<ledger-kind>`
    pub account_prefix: String,
    /// Currency code reported by [`LedgerProfile::info`]
    pub currency_code: String,
    /// Currency symbol reported by [`LedgerProfile::info`]
    pub currency_symbol: String,
    /// Total significant digits of the ledger's amount representation
    pub precision: u32,
    /// Decimal places between the protocol's fixed-point text form and
    /// the ledger's smallest unit
    pub scale: u32,
    /// `<type>` tag of the condition text form
    pub condition_type: u8,
    /// `<suite>` tag of the condition text form
    pub condition_suite: u8,
    /// Digest length in bytes, also the trailing `<len>` tag
    pub digest_len: usize,
    /// `<type>` tag of the fulfillment text form
    pub fulfillment_type: u8,
}

impl LedgerProfile {
    /// The Ethereum contract-ledger profile
    pub fn ethereum() -> Self {
        Self {
            account_prefix: "g.crypto.ethereum".to_string(),
            currency_code: "ETH".to_string(),
            currency_symbol: "ETH".to_string(),
            precision: 25,
            scale: 18,
            condition_type: 0,
            condition_suite: 3,
            digest_len: 32,
            fulfillment_type: 0,
        }
    }

    /// Ledger metadata exposed to the routing layer
    pub fn info(&self) -> LedgerInfo {
        LedgerInfo {
            currency_code: self.currency_code.clone(),
            currency_symbol: self.currency_symbol.clone(),
            precision: self.precision,
            scale: self.scale,
        }
    }
}

impl Default for LedgerProfile {
    fn default() -> Self {
        Self::ethereum()
    }
}

/// Ledger metadata in the routing protocol's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInfo {
    pub currency_code: String,
    pub currency_symbol: String,
    pub precision: u32,
    pub scale: u32,
}

/// Configuration consumed at plugin construction.
///
/// No other persisted state exists; the note-to-self side channel is
/// ephemeral by design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Ledger node RPC endpoint address
    pub endpoint: String,
    /// Local account address on the ledger
    pub address: String,
    /// Address of the conditional-transfer contract
    pub contract: String,
    /// Contract interface description (ABI), opaque to this adapter
    #[serde(default)]
    pub interface: serde_json::Value,
    #[serde(default)]
    pub profile: LedgerProfile,
}
