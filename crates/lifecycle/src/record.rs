//! Deployment records and their constructor arguments.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{Address, B256, Bytes, U256},
};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::amount::decimal;

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render epoch milliseconds as an RFC 3339 UTC timestamp.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}

/// A single constructor argument.
///
/// Stored as `{"type": "...", "value": ...}` so that an address, a hex byte string and a plain
/// string never collapse into the same JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ConstructorArg {
    String(String),
    Integer(#[serde(with = "decimal")] U256),
    Address(Address),
    Bytes(Bytes),
    Bool(bool),
    List(Vec<ConstructorArg>),
}

impl ConstructorArg {
    /// Convert a loosely-typed JSON value, as typed by an operator on the command line.
    ///
    /// Tagged objects (`{"type": "integer", "value": "1000"}`) are accepted verbatim, which is the
    /// only way to pass integers larger than `u64`.
    pub fn from_json(value: &Value) -> anyhow::Result<Self> {
        match value {
            Value::String(text) => Ok(Self::from_text(text)?),
            Value::Number(number) => number
                .as_u64()
                .map(|n| Self::Integer(U256::from(n)))
                .with_context(|| {
                    format!(
                        "Unsupported number '{}': use a tagged integer with a decimal string",
                        number
                    )
                }),
            Value::Bool(flag) => Ok(Self::Bool(*flag)),
            Value::Array(items) => Ok(Self::List(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<anyhow::Result<Vec<_>>>()?,
            )),
            Value::Object(_) => serde_json::from_value(value.clone())
                .context("Invalid tagged constructor argument"),
            Value::Null => anyhow::bail!("Constructor arguments cannot be null"),
        }
    }

    fn from_text(text: &str) -> anyhow::Result<Self> {
        if !text.starts_with("0x") {
            return Ok(Self::String(text.to_string()));
        }
        if text.len() == 42 {
            if let Ok(address) = text.parse::<Address>() {
                return Ok(Self::Address(address));
            }
        }
        let bytes = text
            .parse::<Bytes>()
            .with_context(|| format!("Invalid hex byte string: '{}'", text))?;
        Ok(Self::Bytes(bytes))
    }

    /// Coerce this argument to the type a constructor input declares.
    ///
    /// The stored variant only hints at the value's shape: a hex string becomes `bytesN` or
    /// `bytes` depending on the input, and a decimal string is accepted for any integer type.
    pub fn coerce(&self, ty: &DynSolType) -> anyhow::Result<DynSolValue> {
        match (ty, self) {
            (DynSolType::String, Self::String(text)) => Ok(DynSolValue::String(text.clone())),
            (DynSolType::Uint(bits), Self::Integer(value)) => {
                if value.bit_len() > *bits {
                    anyhow::bail!("{} does not fit in uint{}", value, bits);
                }
                Ok(DynSolValue::Uint(*value, *bits))
            }
            (DynSolType::FixedBytes(size), Self::Bytes(bytes)) => {
                if bytes.len() != *size {
                    anyhow::bail!(
                        "bytes{} needs exactly {} bytes, got {}",
                        size,
                        size,
                        bytes.len()
                    );
                }
                Ok(DynSolValue::FixedBytes(
                    B256::right_padding_from(bytes),
                    *size,
                ))
            }
            (DynSolType::Bytes, Self::Bytes(bytes)) => Ok(DynSolValue::Bytes(bytes.to_vec())),
            (DynSolType::Array(inner), Self::List(items)) => Ok(DynSolValue::Array(
                items
                    .iter()
                    .map(|item| item.coerce(inner))
                    .collect::<anyhow::Result<Vec<_>>>()?,
            )),
            (DynSolType::FixedArray(inner, len), Self::List(items)) => {
                if items.len() != *len {
                    anyhow::bail!("{} needs {} items, got {}", ty.sol_type_name(), len, items.len());
                }
                Ok(DynSolValue::FixedArray(
                    items
                        .iter()
                        .map(|item| item.coerce(inner))
                        .collect::<anyhow::Result<Vec<_>>>()?,
                ))
            }
            (DynSolType::Tuple(types), Self::List(items)) => {
                if items.len() != types.len() {
                    anyhow::bail!(
                        "{} needs {} components, got {}",
                        ty.sol_type_name(),
                        types.len(),
                        items.len()
                    );
                }
                Ok(DynSolValue::Tuple(
                    types
                        .iter()
                        .zip(items)
                        .map(|(ty, item)| item.coerce(ty))
                        .collect::<anyhow::Result<Vec<_>>>()?,
                ))
            }
            _ => {
                let Some(literal) = self.literal() else {
                    anyhow::bail!("A list cannot be passed as {}", ty.sol_type_name());
                };
                ty.coerce_str(&literal).with_context(|| {
                    format!("Cannot use '{}' as {}", literal, ty.sol_type_name())
                })
            }
        }
    }

    /// Textual form of a scalar argument, as the ABI literal parser reads it.
    fn literal(&self) -> Option<String> {
        match self {
            Self::String(text) => Some(text.clone()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Address(address) => Some(address.to_string()),
            Self::Bytes(bytes) => Some(bytes.to_string()),
            Self::Bool(flag) => Some(flag.to_string()),
            Self::List(_) => None,
        }
    }

    /// The ABI value this argument encodes to when no constructor ABI is known.
    pub fn to_sol_value(&self) -> DynSolValue {
        match self {
            Self::String(text) => DynSolValue::String(text.clone()),
            Self::Integer(value) => DynSolValue::Uint(*value, 256),
            Self::Address(address) => DynSolValue::Address(*address),
            Self::Bytes(bytes) => DynSolValue::Bytes(bytes.to_vec()),
            Self::Bool(flag) => DynSolValue::Bool(*flag),
            Self::List(items) => {
                DynSolValue::Array(items.iter().map(Self::to_sol_value).collect())
            }
        }
    }
}

/// ABI-encode constructor arguments with types inferred from the values alone.
///
/// Only used for artifacts that carry no ABI; see [`crate::Artifact::encode_constructor_args`].
pub fn encode_constructor_args(args: &[ConstructorArg]) -> Bytes {
    if args.is_empty() {
        return Bytes::new();
    }
    let values = args.iter().map(ConstructorArg::to_sol_value).collect();
    DynSolValue::Tuple(values).abi_encode_params().into()
}

/// Status of a record as shown to operators. A rollback hides the verification state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    RolledBack,
    Verified,
    Unverified,
}

/// One contract's deployment on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Logical key, unique within a network's store.
    pub contract_name: String,
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
    /// Epoch millis at which the record was saved.
    pub timestamp: i64,
    pub network: String,
    #[serde(with = "decimal")]
    pub gas_used: U256,
    #[serde(with = "decimal")]
    pub gas_price: U256,
    pub deployer: Address,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub constructor_args: Vec<ConstructorArg>,
    #[serde(default)]
    pub rolled_back: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back_at: Option<i64>,
}

impl DeploymentRecord {
    pub fn status(&self) -> DeploymentStatus {
        if self.rolled_back {
            DeploymentStatus::RolledBack
        } else if self.verified {
            DeploymentStatus::Verified
        } else {
            DeploymentStatus::Unverified
        }
    }

    /// Whether the record still describes a live deployment.
    pub fn is_active(&self) -> bool {
        !self.rolled_back
    }

    /// Deployment cost in wei.
    pub fn cost(&self) -> U256 {
        self.gas_used.saturating_mul(self.gas_price)
    }
}
