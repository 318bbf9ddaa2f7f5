//! Typed request parameters and results of the `eth_*` namespace.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Hex quantity (`"0x1b4"`) serde for `u64`. Plain JSON numbers are accepted
/// on input.
pub mod quantity {
    use super::*;

    pub fn serialize<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{v:x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => parse(&s).map_err(de::Error::custom),
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| de::Error::custom(format!("{n} is not a u64 quantity"))),
            other => Err(de::Error::custom(format!("expected quantity, got {other}"))),
        }
    }

    pub fn parse(s: &str) -> Result<u64, String> {
        match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).map_err(|e| format!("quantity '{s}': {e}")),
            None => s.parse().map_err(|e| format!("quantity '{s}': {e}")),
        }
    }
}

/// `Option<u64>` variant of [`quantity`].
pub mod opt_quantity {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => quantity::serialize(v, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) => quantity::parse(&s).map(Some).map_err(de::Error::custom),
            Value::Number(n) => Ok(n.as_u64()),
            other => Err(de::Error::custom(format!("expected quantity, got {other}"))),
        }
    }
}

/// A block height or tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockNumber {
    Number(u64),
    Earliest,
    #[default]
    Latest,
    Pending,
    Safe,
    Finalized,
}

impl BlockNumber {
    /// A concrete height (as opposed to a tag).
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "0x{n:x}"),
            Self::Earliest => write!(f, "earliest"),
            Self::Latest => write!(f, "latest"),
            Self::Pending => write!(f, "pending"),
            Self::Safe => write!(f, "safe"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

impl FromStr for BlockNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            "pending" => Ok(Self::Pending),
            "safe" => Ok(Self::Safe),
            "finalized" => Ok(Self::Finalized),
            other => quantity::parse(other).map(Self::Number),
        }
    }
}

impl Serialize for BlockNumber {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BlockNumber {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => s.parse().map_err(de::Error::custom),
            Value::Number(n) => n
                .as_u64()
                .map(Self::Number)
                .ok_or_else(|| de::Error::custom(format!("{n} is not a block number"))),
            other => Err(de::Error::custom(format!("expected block number, got {other}"))),
        }
    }
}

/// A block by height/tag or by hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockId {
    Number(BlockNumber),
    Hash(String),
}

impl BlockId {
    /// Parse a hash (32 bytes, 0x-prefixed), a tag or a height.
    pub fn parse(s: &str) -> Result<Self, String> {
        if is_block_hash(s) {
            return Ok(Self::Hash(s.to_string()));
        }
        s.parse().map(Self::Number)
    }
}

impl From<BlockNumber> for BlockId {
    fn from(n: BlockNumber) -> Self {
        Self::Number(n)
    }
}

impl From<u64> for BlockId {
    fn from(n: u64) -> Self {
        Self::Number(BlockNumber::Number(n))
    }
}

/// 0x-prefixed 32-byte hex string.
pub fn is_block_hash(s: &str) -> bool {
    s.len() == 66 && s.starts_with("0x") && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Parameters of `eth_call`, `eth_estimateGas` and `eth_sendTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_quantity")]
    pub gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_quantity")]
    pub nonce: Option<u64>,
}

/// Header fields of a block, as pushed by `newHeads`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    #[serde(default, with = "opt_quantity")]
    pub number: Option<u64>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub parent_hash: String,
    #[serde(default, with = "opt_quantity")]
    pub timestamp: Option<u64>,
    #[serde(default, with = "opt_quantity")]
    pub gas_limit: Option<u64>,
    #[serde(default, with = "opt_quantity")]
    pub gas_used: Option<u64>,
    #[serde(default)]
    pub miner: Option<String>,
}

/// A block with its transactions (hashes or full objects).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(flatten)]
    pub header: BlockHeader,
    #[serde(default)]
    pub transactions: Vec<Value>,
}

/// A transaction as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, with = "opt_quantity")]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default, with = "opt_quantity")]
    pub gas: Option<u64>,
    #[serde(default)]
    pub gas_price: Option<U256>,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default, with = "opt_quantity")]
    pub block_number: Option<u64>,
    #[serde(default, with = "opt_quantity")]
    pub transaction_index: Option<u64>,
}

/// A mined transaction's receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default, with = "opt_quantity")]
    pub transaction_index: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default, with = "opt_quantity")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, with = "opt_quantity")]
    pub gas_used: Option<u64>,
    #[serde(default, with = "opt_quantity")]
    pub cumulative_gas_used: Option<u64>,
    #[serde(default)]
    pub contract_address: Option<String>,
    /// `Some(true)` for `0x1`, `Some(false)` for `0x0`, `None` before Byzantium
    #[serde(default, with = "status")]
    pub status: Option<bool>,
    #[serde(default)]
    pub logs: Vec<Value>,
}

impl TransactionReceipt {
    pub fn failed(&self) -> bool {
        self.status == Some(false)
    }
}

mod status {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<bool>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(true) => s.serialize_str("0x1"),
            Some(false) => s.serialize_str("0x0"),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(b)),
            Value::String(s) => quantity::parse(&s)
                .map(|n| Some(n != 0))
                .map_err(de::Error::custom),
            Value::Number(n) => Ok(n.as_u64().map(|n| n != 0)),
            other => Err(de::Error::custom(format!("expected status, got {other}"))),
        }
    }
}
