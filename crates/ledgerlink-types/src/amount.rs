//! Exact base-unit amounts
//!
//! Ledger amounts are non-negative integers of the ledger's smallest unit
//! (wei for the Ethereum profile). `u128` covers the full on-chain range;
//! conversion to and from fixed-point decimal text happens in the codec
//! crate at the protocol boundary, never here.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{PluginError, Result};

/// A non-negative amount in the ledger's smallest unit.
///
/// Serialized as an exact decimal integer string: JSON numbers cannot carry
/// the full `u128` range, and the routing protocol expects integer strings
/// for balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    /// The zero amount
    pub const ZERO: Amount = Amount(0);

    /// Create an amount from raw base units
    pub const fn from_base_units(value: u128) -> Self {
        Self(value)
    }

    /// Raw base units
    pub const fn base_units(self) -> u128 {
        self.0
    }

    /// Check if the amount is zero
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u128>()
            .map(Self)
            .map_err(|_| PluginError::malformed("amount", format!("not a base-unit integer: {s:?}")))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
