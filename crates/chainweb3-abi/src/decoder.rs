//! Event log and method return decoding.
//!
//! # Log layout
//! - `topics[0]`: keccak256 of the event signature (absent for anonymous events)
//! - `topics[1..]`: indexed inputs in declaration order, one 32-byte word each
//! - `data`: ABI-encoded tuple of the non-indexed inputs
//!
//! Indexed `string`, `bytes`, arrays and tuples are stored as their hash and
//! come back as that hash verbatim.

use std::sync::Arc;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::Address;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::AbiError;
use crate::item::{AbiItem, AbiParam};
use crate::mapper::AbiModel;
use crate::normalizer::normalize_param;
use crate::signature::keccak256;
use crate::value::{decode_hex, AbiValue};

/// A log as returned by `eth_getLogs` or pushed by a `logs` subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    pub block_number: Option<String>,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub transaction_index: Option<String>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl RawLog {
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    /// Stable id derived from block hash, transaction hash and log index.
    pub fn id(&self) -> Option<String> {
        let block_hash = self.block_hash.as_deref()?;
        let tx_hash = self.transaction_hash.as_deref()?;
        let log_index = self.log_index.as_deref()?;
        let seed = format!(
            "{}{}{}",
            strip_0x(block_hash),
            strip_0x(tx_hash),
            strip_0x(log_index)
        );
        let hash = hex::encode(keccak256(seed.as_bytes()));
        Some(format!("log_{}", &hash[..8]))
    }
}

/// The original `data` and `topics` of a decoded log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogData {
    pub data: String,
    pub topics: Vec<String>,
}

/// A log decoded against an event definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedLog {
    /// Emitting contract, EIP-55 checksummed
    pub address: String,
    pub block_number: Option<u64>,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub transaction_index: Option<u64>,
    pub log_index: Option<u64>,
    pub removed: bool,
    pub id: Option<String>,
    /// Decoded inputs keyed by name (or position), in declaration order
    pub return_values: IndexMap<String, AbiValue>,
    /// Event name, `None` when no definition matched
    pub event: Option<String>,
    /// Event signature, `None` for anonymous or unmatched events
    pub signature: Option<String>,
    pub raw: RawLogData,
}

impl DecodedLog {
    /// Look up a decoded input by name or position.
    pub fn value(&self, key: &str) -> Option<&AbiValue> {
        self.return_values.get(key)
    }

    /// Shell with the log metadata and no decoded values.
    fn from_raw(log: &RawLog) -> Self {
        let address = log
            .address
            .parse::<Address>()
            .map(|a| a.to_checksum(None))
            .unwrap_or_else(|_| log.address.clone());
        Self {
            address,
            block_number: log.block_number.as_deref().and_then(parse_quantity),
            block_hash: log.block_hash.clone(),
            transaction_hash: log.transaction_hash.clone(),
            transaction_index: log.transaction_index.as_deref().and_then(parse_quantity),
            log_index: log.log_index.as_deref().and_then(parse_quantity),
            removed: log.removed,
            id: log.id(),
            return_values: IndexMap::new(),
            event: None,
            signature: None,
            raw: RawLogData {
                data: log.data.clone(),
                topics: log.topics.clone(),
            },
        }
    }
}

/// Decodes raw logs for a subscription or a past-events query.
pub trait LogDecoder: Send + Sync {
    fn decode(&self, log: &RawLog) -> Result<DecodedLog, AbiError>;
}

/// Decodes logs of one known event.
#[derive(Debug, Clone)]
pub struct EventLogDecoder {
    item: Arc<AbiItem>,
}

impl EventLogDecoder {
    pub fn new(item: Arc<AbiItem>) -> Self {
        Self { item }
    }

    pub fn item(&self) -> &AbiItem {
        &self.item
    }
}

impl LogDecoder for EventLogDecoder {
    fn decode(&self, log: &RawLog) -> Result<DecodedLog, AbiError> {
        decode_log(&self.item, log)
    }
}

/// Decodes logs of any event in the model, picked by `topics[0]`. For a log
/// matching no event, `topics[1..]` become opaque 32-byte values keyed by
/// position; the signature topic and the data stay only in `raw`.
#[derive(Debug, Clone)]
pub struct AllEventsLogDecoder {
    model: Arc<AbiModel>,
}

impl AllEventsLogDecoder {
    pub fn new(model: Arc<AbiModel>) -> Self {
        Self { model }
    }
}

impl LogDecoder for AllEventsLogDecoder {
    fn decode(&self, log: &RawLog) -> Result<DecodedLog, AbiError> {
        if let Some(item) = log.topic0().and_then(|t| self.model.event_by_topic(t)) {
            return decode_log(item, log);
        }

        let mut decoded = DecodedLog::from_raw(log);
        for (i, topic) in log.topics.iter().skip(1).enumerate() {
            let word = decode_hex(topic).map_err(|reason| AbiError::InvalidHex { reason })?;
            decoded.return_values.insert(i.to_string(), AbiValue::Bytes(word));
        }
        Ok(decoded)
    }
}

/// Decode `log` against `item`.
pub fn decode_log(item: &AbiItem, log: &RawLog) -> Result<DecodedLog, AbiError> {
    let mut decoded = DecodedLog::from_raw(log);

    let mut topics = log.topics.iter();
    if !item.anonymous {
        if let Some(topic0) = topics.next() {
            if topic0.eq_ignore_ascii_case(&item.signature) {
                decoded.signature = Some(item.signature.clone());
            }
        }
    }

    let indexed_count = item.indexed_inputs().count();
    let indexed_topics: Vec<&String> = topics.collect();
    if indexed_topics.len() < indexed_count {
        return Err(AbiError::InvalidLog {
            reason: format!(
                "{} declares {indexed_count} indexed inputs but the log carries {} topics",
                item.full_name,
                indexed_topics.len()
            ),
        });
    }

    let mut data_values = decode_data(item, &log.data)?.into_iter();
    let mut indexed = indexed_topics.into_iter();

    for (position, (param, ty)) in item.inputs.iter().zip(&item.input_types).enumerate() {
        let value = if param.indexed {
            // length checked above
            let Some(topic) = indexed.next() else { break };
            decode_topic(param, ty, topic)?
        } else {
            match data_values.next() {
                Some(v) => normalize_param(v, param),
                None => AbiValue::Null,
            }
        };
        decoded.return_values.insert(param.key(position), value);
    }

    decoded.event = Some(item.name.clone());
    Ok(decoded)
}

fn decode_data(item: &AbiItem, data: &str) -> Result<Vec<DynSolValue>, AbiError> {
    let types: Vec<DynSolType> = item
        .inputs
        .iter()
        .zip(&item.input_types)
        .filter(|(p, _)| !p.indexed)
        .map(|(_, t)| t.clone())
        .collect();
    if types.is_empty() {
        return Ok(Vec::new());
    }

    let bytes = decode_hex(data).map_err(|reason| AbiError::InvalidHex { reason })?;
    match DynSolType::Tuple(types).abi_decode_params(&bytes) {
        Ok(DynSolValue::Tuple(values)) => Ok(values),
        Ok(other) => Ok(vec![other]),
        Err(e) => Err(AbiError::DecodeFailed {
            reason: format!("{} data: {e}", item.full_name),
        }),
    }
}

fn decode_topic(param: &AbiParam, ty: &DynSolType, topic: &str) -> Result<AbiValue, AbiError> {
    let word = decode_hex(topic).map_err(|reason| AbiError::InvalidHex { reason })?;
    if word.len() != 32 {
        return Err(AbiError::InvalidLog {
            reason: format!("topic for '{}' is {} bytes, expected 32", param.name, word.len()),
        });
    }
    if param.is_hashed_when_indexed() {
        return Ok(AbiValue::Bytes(word));
    }
    let value = ty.abi_decode(&word).map_err(|e| AbiError::DecodeFailed {
        reason: format!("topic for '{}': {e}", param.name),
    })?;
    Ok(normalize_param(value, param))
}

/// Decode `eth_call` output against the item's outputs.
///
/// An empty result (`0x`) is `None`. A single output is returned bare;
/// several come back as a tuple keyed by output name or position.
pub fn decode_method_return(item: &AbiItem, output: &str) -> Result<Option<AbiValue>, AbiError> {
    let bytes = decode_hex(output).map_err(|reason| AbiError::InvalidHex { reason })?;
    if bytes.is_empty() || item.outputs.is_empty() {
        return Ok(None);
    }

    let mut values = decode_with(&item.outputs, &item.output_types, &bytes)?;
    if values.len() == 1 {
        return Ok(values.pop().map(|(_, v)| v));
    }
    Ok(Some(AbiValue::Tuple(values)))
}

/// Decode an ABI-encoded parameter list into named values.
pub fn decode_parameters(params: &[AbiParam], data: &str) -> Result<IndexMap<String, AbiValue>, AbiError> {
    let types = params
        .iter()
        .map(AbiParam::sol_type)
        .collect::<Result<Vec<_>, _>>()?;
    let bytes = decode_hex(data).map_err(|reason| AbiError::InvalidHex { reason })?;
    Ok(decode_with(params, &types, &bytes)?.into_iter().collect())
}

fn decode_with(
    params: &[AbiParam],
    types: &[DynSolType],
    bytes: &[u8],
) -> Result<Vec<(String, AbiValue)>, AbiError> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    let decoded = DynSolType::Tuple(types.to_vec())
        .abi_decode_params(bytes)
        .map_err(|e| AbiError::DecodeFailed {
            reason: e.to_string(),
        })?;
    let values = match decoded {
        DynSolValue::Tuple(vals) => vals,
        other => vec![other],
    };
    Ok(params
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (p, v))| (p.key(i), normalize_param(v, p)))
        .collect())
}

/// Parse a hex quantity such as `"0x1b4"`.
pub fn parse_quantity(s: &str) -> Option<u64> {
    u64::from_str_radix(strip_0x(s), 16).ok()
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}
