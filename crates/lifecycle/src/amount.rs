//! Wei-denominated amounts.
//!
//! Gas, gas prices and costs are always [`U256`]. They are persisted as decimal strings and only
//! converted to ether for display.

use alloy_core::primitives::{U256, utils::format_ether};
use anyhow::Context;
use serde::{Deserialize, Deserializer, Serializer, de};

/// Gas price used when the chain client reports no fee data: 20 gwei.
pub const DEFAULT_GAS_PRICE: U256 = U256::from_limbs([20_000_000_000, 0, 0, 0]);

/// Parse an amount from a decimal string, or a `0x`-prefixed hex quantity as returned by JSON-RPC.
pub fn parse_amount(raw: &str) -> anyhow::Result<U256> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some("") => Ok(U256::ZERO),
        Some(hex) => U256::from_str_radix(hex, 16)
            .with_context(|| format!("Invalid hex quantity: '{}'", raw)),
        None => U256::from_str_radix(raw, 10)
            .with_context(|| format!("Invalid decimal amount: '{}'", raw)),
    }
}

/// Render a wei amount in ether, without trailing zeros (`0` renders as `"0"`).
pub fn display_ether(wei: U256) -> String {
    let formatted = format_ether(wei);
    if !formatted.contains('.') {
        return formatted;
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Serde adapter storing a [`U256`] as a decimal string.
///
/// Plain JSON/TOML integers are accepted on input so hand-written documents still load.
pub mod decimal {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Text(text) => parse_amount(&text).map_err(de::Error::custom),
            RawAmount::Number(number) => Ok(U256::from(number)),
        }
    }
}
